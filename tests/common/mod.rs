// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use finance::api::AppState;
use finance::auth::Sessions;
use finance::db::Db;
use finance::error::AppError;
use finance::ledger::Ledger;
use finance::models::Quote;
use finance::quotes::{normalize_symbol, QuoteProvider};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Quote provider with a fixed, adjustable price table.
#[derive(Default)]
pub struct StubQuotes {
    prices: Mutex<HashMap<String, Quote>>,
    offline: Mutex<bool>,
}

impl StubQuotes {
    pub fn with(entries: &[(&str, &str, &str)]) -> Arc<StubQuotes> {
        let stub = StubQuotes::default();
        for (symbol, name, price) in entries {
            stub.set(symbol, name, price);
        }
        Arc::new(stub)
    }

    pub fn set(&self, symbol: &str, name: &str, price: &str) {
        self.prices.lock().unwrap().insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                name: name.to_string(),
                price: dec(price),
            },
        );
    }

    pub fn remove(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }
}

#[async_trait]
impl QuoteProvider for StubQuotes {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, AppError> {
        if *self.offline.lock().unwrap() {
            return Err(AppError::Upstream("connection refused".to_string()));
        }
        let symbol = match normalize_symbol(symbol) {
            Some(symbol) => symbol,
            None => return Ok(None),
        };
        Ok(self.prices.lock().unwrap().get(&symbol).cloned())
    }
}

pub fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

pub fn default_quotes() -> Arc<StubQuotes> {
    StubQuotes::with(&[
        ("AAPL", "Apple Inc.", "100.00"),
        ("NFLX", "Netflix, Inc.", "250.50"),
    ])
}

pub fn ledger(quotes: Arc<StubQuotes>) -> Ledger {
    Ledger::new(Db::open_in_memory().unwrap(), quotes)
}

pub fn app_state(quotes: Arc<StubQuotes>) -> AppState {
    AppState {
        ledger: Arc::new(ledger(quotes)),
        sessions: Arc::new(Sessions::new(b"integration-secret".to_vec(), 3600)),
    }
}
