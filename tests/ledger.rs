// tests/ledger.rs
mod common;

use common::{dec, default_quotes, ledger};
use finance::auth;
use finance::error::{AppError, DomainError};
use finance::forms::{RegisterRequest, ShareCount};
use finance::ledger::Ledger;
use finance::models::{CurrentUser, TradeKind};

async fn new_user(ledger: &Ledger, name: &str) -> CurrentUser {
    let id = auth::register(
        ledger.db(),
        RegisterRequest {
            username: name.to_string(),
            password: "pw".to_string(),
        },
    )
    .await
    .unwrap();
    CurrentUser { id }
}

fn shares(n: i64) -> ShareCount {
    ShareCount::parse(Some(&n.to_string())).unwrap()
}

#[tokio::test]
async fn buying_debits_cash_and_appends_a_row() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    let trade = ledger.buy(user, "AAPL", shares(10)).await.unwrap();
    assert_eq!(trade.kind, TradeKind::Buy);
    assert_eq!(trade.shares, 10);
    assert_eq!(trade.price, dec("100.00"));

    assert_eq!(ledger.cash(user).await.unwrap(), dec("9000.00"));
    let portfolio = ledger.portfolio(user).await.unwrap();
    assert_eq!(portfolio.holdings.len(), 1);
    let holding = &portfolio.holdings[0];
    assert_eq!(holding.symbol, "AAPL");
    assert_eq!(holding.name, "Apple Inc.");
    assert_eq!(holding.shares, 10);
    assert_eq!(holding.value, dec("1000.00"));
    assert_eq!(portfolio.cash, dec("9000.00"));
    assert_eq!(portfolio.total, dec("10000.00"));

    let history = ledger.history(user).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].shares, 10);
}

#[tokio::test]
async fn symbols_are_case_insensitive() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    ledger.buy(user, " aapl", shares(2)).await.unwrap();
    ledger.sell(user, "Aapl", shares(1)).await.unwrap();
    assert_eq!(ledger.held_symbols(user).await.unwrap(), vec!["AAPL".to_string()]);
}

#[tokio::test]
async fn buying_beyond_cash_changes_nothing() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    let err = ledger.buy(user, "AAPL", shares(101)).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InsufficientFunds)));
    assert_eq!(ledger.cash(user).await.unwrap(), dec("10000.00"));
    assert!(ledger.history(user).await.unwrap().is_empty());

    // Spending the balance down to exactly zero is allowed.
    ledger.buy(user, "AAPL", shares(100)).await.unwrap();
    assert_eq!(ledger.cash(user).await.unwrap(), dec("0"));
}

#[tokio::test]
async fn unknown_symbols_are_rejected() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    for symbol in ["ZZZZ", "", "A/B"] {
        let err = ledger.buy(user, symbol, shares(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::UnknownSymbol)));
    }
    let err = ledger.sell(user, "ZZZZ", shares(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::UnknownSymbol)));
    assert_eq!(ledger.cash(user).await.unwrap(), dec("10000.00"));
}

#[tokio::test]
async fn selling_more_than_held_changes_nothing() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    let err = ledger.sell(user, "NFLX", shares(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InsufficientShares)));

    ledger.buy(user, "AAPL", shares(5)).await.unwrap();
    let err = ledger.sell(user, "AAPL", shares(6)).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InsufficientShares)));

    assert_eq!(ledger.cash(user).await.unwrap(), dec("9500.00"));
    assert_eq!(ledger.history(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn selling_everything_clears_the_symbol_history() {
    let quotes = default_quotes();
    let ledger = ledger(quotes.clone());
    let user = new_user(&ledger, "alice").await;

    ledger.buy(user, "AAPL", shares(10)).await.unwrap();
    ledger.buy(user, "NFLX", shares(2)).await.unwrap();
    quotes.set("AAPL", "Apple Inc.", "110.00");

    let trade = ledger.sell(user, "AAPL", shares(10)).await.unwrap();
    assert_eq!(trade.kind, TradeKind::Sell);
    assert_eq!(trade.shares, -10);

    assert_eq!(ledger.cash(user).await.unwrap(), dec("9599.00"));
    let portfolio = ledger.portfolio(user).await.unwrap();
    assert!(portfolio.holdings.iter().all(|h| h.symbol != "AAPL"));
    let history = ledger.history(user).await.unwrap();
    assert!(history.iter().all(|t| t.symbol != "AAPL"));
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn scenario_round_trip_at_a_profit() {
    let quotes = default_quotes();
    let ledger = ledger(quotes.clone());
    let user = new_user(&ledger, "alice").await;

    ledger.buy(user, "AAPL", shares(10)).await.unwrap();
    quotes.set("AAPL", "Apple Inc.", "110.00");
    ledger.sell(user, "AAPL", shares(10)).await.unwrap();

    let portfolio = ledger.portfolio(user).await.unwrap();
    assert!(portfolio.holdings.is_empty());
    assert_eq!(portfolio.cash, dec("10100.00"));
    assert_eq!(portfolio.total, dec("10100.00"));
    assert!(ledger.history(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_sells_keep_history() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    ledger.buy(user, "AAPL", shares(10)).await.unwrap();
    ledger.sell(user, "AAPL", shares(4)).await.unwrap();

    let history = ledger.history(user).await.unwrap();
    assert_eq!(
        history.iter().map(|t| t.shares).collect::<Vec<_>>(),
        vec![10, -4]
    );
    assert_eq!(history[1].kind, TradeKind::Sell);
    let portfolio = ledger.portfolio(user).await.unwrap();
    assert_eq!(portfolio.holdings[0].shares, 6);
}

#[tokio::test]
async fn deposits_add_exactly_the_amount() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;

    let balance = ledger.deposit(user, 500).await.unwrap();
    assert_eq!(balance, dec("10500.00"));
    assert_eq!(ledger.cash(user).await.unwrap(), dec("10500.00"));
}

#[tokio::test]
async fn users_do_not_see_each_other() {
    let ledger = ledger(default_quotes());
    let alice = new_user(&ledger, "alice").await;
    let bob = new_user(&ledger, "bob").await;

    ledger.buy(alice, "AAPL", shares(3)).await.unwrap();
    assert!(ledger.history(bob).await.unwrap().is_empty());
    assert_eq!(ledger.cash(bob).await.unwrap(), dec("10000.00"));
    let err = ledger.sell(bob, "AAPL", shares(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InsufficientShares)));
}

#[tokio::test]
async fn portfolio_falls_back_to_last_traded_price() {
    let quotes = default_quotes();
    let ledger = ledger(quotes.clone());
    let user = new_user(&ledger, "alice").await;

    ledger.buy(user, "AAPL", shares(2)).await.unwrap();
    ledger.buy(user, "NFLX", shares(1)).await.unwrap();

    quotes.remove("NFLX");
    let portfolio = ledger.portfolio(user).await.unwrap();
    let nflx = portfolio.holdings.iter().find(|h| h.symbol == "NFLX").unwrap();
    assert_eq!(nflx.price, dec("250.50"));

    quotes.set_offline(true);
    let portfolio = ledger.portfolio(user).await.unwrap();
    assert_eq!(portfolio.total, dec("10000.00"));
}

#[tokio::test]
async fn concurrent_sells_cannot_oversell() {
    let ledger = ledger(default_quotes());
    let user = new_user(&ledger, "alice").await;
    ledger.buy(user, "AAPL", shares(10)).await.unwrap();

    let (first, second) = tokio::join!(
        ledger.sell(user, "AAPL", shares(10)),
        ledger.sell(user, "AAPL", shares(10)),
    );
    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );
    assert_eq!(ledger.cash(user).await.unwrap(), dec("10000.00"));
}

#[tokio::test]
async fn provider_outage_is_an_upstream_error() {
    let quotes = default_quotes();
    let ledger = ledger(quotes.clone());
    let user = new_user(&ledger, "alice").await;

    quotes.set_offline(true);
    let err = ledger.buy(user, "AAPL", shares(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
    assert_eq!(ledger.cash(user).await.unwrap(), dec("10000.00"));
}

#[tokio::test]
async fn positions_cannot_grow_past_i64() {
    let quotes = default_quotes();
    quotes.set("PNY", "Penny Co.", "0.0001");
    let ledger = ledger(quotes);
    let user = new_user(&ledger, "alice").await;

    ledger.deposit(user, i64::MAX).await.unwrap();
    ledger.buy(user, "PNY", shares(i64::MAX)).await.unwrap();
    let cash = ledger.cash(user).await.unwrap();

    let err = ledger.buy(user, "PNY", shares(i64::MAX)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid Shares"));
    assert_eq!(ledger.cash(user).await.unwrap(), cash);
    assert_eq!(ledger.history(user).await.unwrap().len(), 1);

    let portfolio = ledger.portfolio(user).await.unwrap();
    assert_eq!(portfolio.holdings[0].shares, i64::MAX);
    ledger.sell(user, "PNY", shares(i64::MAX)).await.unwrap();
    assert!(ledger.held_symbols(user).await.unwrap().is_empty());
}
