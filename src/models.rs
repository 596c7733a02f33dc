// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every new account starts with this much cash.
pub const STARTING_CASH: &str = "10000.00";

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub hash: String,
    pub cash: Decimal,
}

/// The authenticated identity for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Buy => "Buy",
            TradeKind::Sell => "Sell",
        }
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(TradeKind::Buy),
            "Sell" => Ok(TradeKind::Sell),
            other => Err(format!("unknown trade kind {:?}", other)),
        }
    }
}

/// One row of the `stocks` ledger. Shares are signed: positive for a buy,
/// negative for a sell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub shares: i64,
    pub kind: TradeKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
    pub cash: Decimal,
    pub total: Decimal,
}
