// src/ledger.rs
use crate::db::{self, Db};
use crate::error::{AppError, DomainError};
use crate::forms::ShareCount;
use crate::models::{CurrentUser, Holding, Portfolio, Quote, Trade, TradeKind};
use crate::quotes::SharedQuoteProvider;
use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;

/// Applies trades and deposits to a user's balance and ledger rows.
///
/// Every mutation resolves its quote first, then runs all reads, checks and
/// writes inside one storage transaction, so a rejected or failed operation
/// leaves both the balance and the ledger untouched.
pub struct Ledger {
    db: Db,
    quotes: SharedQuoteProvider,
}

impl Ledger {
    pub fn new(db: Db, quotes: SharedQuoteProvider) -> Self {
        Ledger { db, quotes }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote, AppError> {
        self.quotes
            .lookup(symbol)
            .await?
            .ok_or(AppError::Domain(DomainError::UnknownSymbol))
    }

    pub async fn buy(
        &self,
        user: CurrentUser,
        symbol: &str,
        shares: ShareCount,
    ) -> Result<Trade, AppError> {
        let quote = self.quote(symbol).await?;
        let count = shares.get();
        let cost = quote
            .price
            .checked_mul(Decimal::from(count))
            .ok_or(AppError::Domain(DomainError::InsufficientFunds))?;

        let trade = self
            .db
            .transaction(|tx| {
                // The position is summed on every read, so it has to stay an i64.
                db::net_shares(tx, user.id, &quote.symbol)?
                    .checked_add(count)
                    .ok_or_else(|| AppError::validation("Invalid Shares"))?;
                let cash = db::cash(tx, user.id)?;
                if cost > cash {
                    return Err(DomainError::InsufficientFunds.into());
                }
                db::set_cash(tx, user.id, cash - cost)?;
                record(tx, user, &quote, count, TradeKind::Buy)
            })
            .await?;

        info!(
            "User {} bought {} {} at {} for {}.",
            user.id, count, trade.symbol, trade.price, cost
        );
        Ok(trade)
    }

    /// Sells `shares` of `symbol`. When the sale leaves the user flat in the
    /// symbol, every ledger row for that symbol is removed.
    pub async fn sell(
        &self,
        user: CurrentUser,
        symbol: &str,
        shares: ShareCount,
    ) -> Result<Trade, AppError> {
        let quote = self.quote(symbol).await?;
        let count = shares.get();
        let proceeds = quote.price * Decimal::from(count);

        let (trade, closed) = self
            .db
            .transaction(|tx| {
                let held = db::net_shares(tx, user.id, &quote.symbol)?;
                if count > held {
                    return Err(DomainError::InsufficientShares.into());
                }
                let cash = db::cash(tx, user.id)?;
                db::set_cash(tx, user.id, cash + proceeds)?;
                let trade = record(tx, user, &quote, -count, TradeKind::Sell)?;

                let remaining = db::net_shares(tx, user.id, &quote.symbol)?;
                let closed = remaining == 0;
                if closed {
                    db::delete_trades(tx, user.id, &quote.symbol)?;
                }
                Ok((trade, closed))
            })
            .await?;

        info!(
            "User {} sold {} {} at {} for {}.",
            user.id, count, trade.symbol, trade.price, proceeds
        );
        if closed {
            info!("User {} closed {}; history rows removed.", user.id, trade.symbol);
        }
        Ok(trade)
    }

    /// Adds a whole-dollar amount to the balance and returns the new balance.
    /// Callers validate that the amount is positive.
    pub async fn deposit(&self, user: CurrentUser, amount: i64) -> Result<Decimal, AppError> {
        let amount = Decimal::from(amount);
        let balance = self
            .db
            .transaction(|tx| {
                let balance = db::cash(tx, user.id)?
                    .checked_add(amount)
                    .ok_or_else(|| AppError::validation("Invalid Amount"))?;
                db::set_cash(tx, user.id, balance)?;
                Ok(balance)
            })
            .await?;
        info!("User {} deposited {}.", user.id, amount);
        Ok(balance)
    }

    pub async fn cash(&self, user: CurrentUser) -> Result<Decimal, AppError> {
        self.db.read(|conn| db::cash(conn, user.id)).await
    }

    pub async fn history(&self, user: CurrentUser) -> Result<Vec<Trade>, AppError> {
        self.db.read(|conn| db::trades(conn, user.id)).await
    }

    pub async fn held_symbols(&self, user: CurrentUser) -> Result<Vec<String>, AppError> {
        let positions = self.db.read(|conn| db::positions(conn, user.id)).await?;
        Ok(positions.into_iter().map(|p| p.symbol).collect())
    }

    /// Current holdings valued at live prices. A symbol the provider cannot
    /// price right now is valued at its last traded price.
    pub async fn portfolio(&self, user: CurrentUser) -> Result<Portfolio, AppError> {
        let (positions, cash) = self
            .db
            .read(|conn| Ok((db::positions(conn, user.id)?, db::cash(conn, user.id)?)))
            .await?;

        let mut holdings = Vec::with_capacity(positions.len());
        for position in positions {
            let price = match self.quotes.lookup(&position.symbol).await {
                Ok(Some(quote)) => quote.price,
                Ok(None) => {
                    warn!(
                        "No live quote for {}; using last traded price.",
                        position.symbol
                    );
                    position.last_price
                }
                Err(e) => {
                    warn!(
                        "Quote lookup for {} failed ({}); using last traded price.",
                        position.symbol, e
                    );
                    position.last_price
                }
            };
            holdings.push(Holding {
                value: price * Decimal::from(position.shares),
                symbol: position.symbol,
                name: position.name,
                shares: position.shares,
                price,
            });
        }

        let total = cash + holdings.iter().map(|h| h.value).sum::<Decimal>();
        Ok(Portfolio {
            holdings,
            cash,
            total,
        })
    }
}

fn record(
    conn: &rusqlite::Connection,
    user: CurrentUser,
    quote: &Quote,
    shares: i64,
    kind: TradeKind,
) -> Result<Trade, AppError> {
    let timestamp = Utc::now();
    let id = db::insert_trade(conn, user.id, quote, shares, kind, timestamp)?;
    Ok(Trade {
        id,
        user_id: user.id,
        symbol: quote.symbol.clone(),
        name: quote.name.clone(),
        price: quote.price,
        shares,
        kind,
        timestamp,
    })
}
