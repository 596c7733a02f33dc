// src/views.rs
use crate::models::{Portfolio, Quote, Trade};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;

/// Formats money as `$1,234.56`.
pub fn usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, cents)
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, logged_in: bool, main: &str) -> String {
    let nav = if logged_in {
        r#"<a href="/quote">Quote</a> <a href="/buy">Buy</a> <a href="/sell">Sell</a> <a href="/history">History</a> <a href="/cash">Cash</a> <a href="/logout">Log Out</a>"#
    } else {
        r#"<a href="/register">Register</a> <a href="/login">Log In</a>"#
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Finance: {}</title></head>\n<body>\n<nav><a href=\"/\">Finance</a> {}</nav>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape(title),
        nav,
        main
    )
}

pub fn apology(message: &str, code: u16) -> String {
    let main = format!(
        "<h1>{}</h1>\n<p class=\"apology\">{}</p>",
        code,
        escape(message)
    );
    layout("Apology", false, &main)
}

pub fn login_form() -> String {
    layout(
        "Log In",
        false,
        r#"<form action="/login" method="post">
<input autocomplete="off" autofocus name="username" placeholder="Username" type="text">
<input name="password" placeholder="Password" type="password">
<button type="submit">Log In</button>
</form>"#,
    )
}

pub fn register_form() -> String {
    layout(
        "Register",
        false,
        r#"<form action="/register" method="post">
<input autocomplete="off" autofocus name="username" placeholder="Username" type="text">
<input name="password" placeholder="Password" type="password">
<input name="confirmation" placeholder="Password (again)" type="password">
<button type="submit">Register</button>
</form>"#,
    )
}

pub fn quote_form() -> String {
    layout(
        "Quote",
        true,
        r#"<form action="/quote" method="post">
<input autocomplete="off" autofocus name="symbol" placeholder="Symbol" type="text">
<button type="submit">Quote</button>
</form>"#,
    )
}

pub fn quoted(quote: &Quote) -> String {
    let main = format!(
        "<p>A share of {} ({}) costs {}.</p>",
        escape(&quote.name),
        escape(&quote.symbol),
        usd(quote.price)
    );
    layout("Quoted", true, &main)
}

pub fn buy_form() -> String {
    layout(
        "Buy",
        true,
        r#"<form action="/buy" method="post">
<input autocomplete="off" autofocus name="symbol" placeholder="Symbol" type="text">
<input min="1" name="shares" placeholder="Shares" type="number">
<button type="submit">Buy</button>
</form>"#,
    )
}

pub fn sell_form(symbols: &[String]) -> String {
    let mut options = String::new();
    for symbol in symbols {
        let symbol = escape(symbol);
        let _ = writeln!(options, "<option value=\"{0}\">{0}</option>", symbol);
    }
    let main = format!(
        "<form action=\"/sell\" method=\"post\">\n<select name=\"symbol\">\n<option disabled selected>Symbol</option>\n{}</select>\n<input min=\"1\" name=\"shares\" placeholder=\"Shares\" type=\"number\">\n<button type=\"submit\">Sell</button>\n</form>",
        options
    );
    layout("Sell", true, &main)
}

pub fn cash_form(balance: Decimal) -> String {
    let main = format!(
        "<p>Current balance: {}</p>\n<form action=\"/cash\" method=\"post\">\n<input autofocus min=\"1\" name=\"deposit\" placeholder=\"Amount\" type=\"number\">\n<button type=\"submit\">Deposit</button>\n</form>",
        usd(balance)
    );
    layout("Cash", true, &main)
}

pub fn portfolio(portfolio: &Portfolio) -> String {
    let mut rows = String::new();
    for h in &portfolio.holdings {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&h.symbol),
            escape(&h.name),
            h.shares,
            usd(h.price),
            usd(h.value)
        );
    }
    let main = format!(
        "<table>\n<thead><tr><th>Symbol</th><th>Name</th><th>Shares</th><th>Price</th><th>TOTAL</th></tr></thead>\n<tbody>\n{}</tbody>\n<tfoot>\n<tr><td colspan=\"4\">Cash</td><td>{}</td></tr>\n<tr><td colspan=\"4\">TOTAL</td><td>{}</td></tr>\n</tfoot>\n</table>",
        rows,
        usd(portfolio.cash),
        usd(portfolio.total)
    );
    layout("Portfolio", true, &main)
}

pub fn history(trades: &[Trade]) -> String {
    let mut rows = String::new();
    for t in trades {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&t.symbol),
            escape(&t.name),
            t.shares,
            usd(t.price),
            t.kind,
            t.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    let main = format!(
        "<table>\n<thead><tr><th>Symbol</th><th>Name</th><th>Shares</th><th>Price</th><th>Transaction</th><th>Transacted</th></tr></thead>\n<tbody>\n{}</tbody>\n</table>",
        rows
    );
    layout("History", true, &main)
}
