// src/db.rs
use crate::error::{AppError, DomainError};
use crate::models::{Quote, Trade, TradeKind, User, STARTING_CASH};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    hash TEXT NOT NULL,
    cash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    price TEXT NOT NULL,
    shares INTEGER NOT NULL,
    kind TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS stocks_user_symbol ON stocks (user_id, symbol);
";

/// Shared handle on the single SQLite connection. Every caller goes through
/// the mutex, so writes are serialized within the process.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

pub async fn init<P: AsRef<Path>>(path: P) -> Result<Db, AppError> {
    let conn = Connection::open(path.as_ref())?;
    let db = Db::from_connection(conn)?;
    info!("Opened database at {}.", path.as_ref().display());
    Ok(db)
}

impl Db {
    pub fn open_in_memory() -> Result<Db, AppError> {
        Db::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Db, AppError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Db {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` inside `BEGIN IMMEDIATE`. The transaction commits only when
    /// `f` returns `Ok`; any error rolls every statement back.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, AppError>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub async fn read<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

/// Position aggregated from the ledger, before any live pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub last_price: Decimal,
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn kind_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<TradeKind> {
    let text: String = row.get(idx)?;
    TradeKind::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

pub fn insert_user(conn: &Connection, username: &str, hash: &str) -> Result<i64, AppError> {
    match conn.execute(
        "INSERT INTO users (username, hash, cash) VALUES (?1, ?2, ?3)",
        params![username, hash, STARTING_CASH],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(DomainError::UsernameTaken.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, AppError> {
    let user = conn
        .query_row(
            "SELECT id, username, hash, cash FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    hash: row.get(2)?,
                    cash: decimal_column(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Cash balance of `user_id`. A session pointing at a user that no longer
/// exists is treated as logged out.
pub fn cash(conn: &Connection, user_id: i64) -> Result<Decimal, AppError> {
    conn.query_row(
        "SELECT cash FROM users WHERE id = ?1",
        params![user_id],
        |row| decimal_column(row, 0),
    )
    .optional()?
    .ok_or(AppError::Unauthenticated)
}

pub fn set_cash(conn: &Connection, user_id: i64, cash: Decimal) -> Result<(), AppError> {
    conn.execute(
        "UPDATE users SET cash = ?1 WHERE id = ?2",
        params![cash.to_string(), user_id],
    )?;
    Ok(())
}

pub fn insert_trade(
    conn: &Connection,
    user_id: i64,
    quote: &Quote,
    shares: i64,
    kind: TradeKind,
    timestamp: DateTime<Utc>,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO stocks (user_id, symbol, name, price, shares, kind, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            quote.symbol,
            quote.name,
            quote.price.to_string(),
            shares,
            kind.as_str(),
            timestamp.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn net_shares(conn: &Connection, user_id: i64, symbol: &str) -> Result<i64, AppError> {
    let shares = conn.query_row(
        "SELECT COALESCE(SUM(shares), 0) FROM stocks WHERE user_id = ?1 AND symbol = ?2",
        params![user_id, symbol],
        |row| row.get(0),
    )?;
    Ok(shares)
}

pub fn delete_trades(conn: &Connection, user_id: i64, symbol: &str) -> Result<usize, AppError> {
    let deleted = conn.execute(
        "DELETE FROM stocks WHERE user_id = ?1 AND symbol = ?2",
        params![user_id, symbol],
    )?;
    Ok(deleted)
}

/// Symbols with a positive net position, ordered by symbol, with the price
/// of the most recent ledger row for each.
pub fn positions(conn: &Connection, user_id: i64) -> Result<Vec<Position>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT s.symbol, MAX(s.name), SUM(s.shares),
                (SELECT latest.price FROM stocks AS latest
                  WHERE latest.user_id = s.user_id AND latest.symbol = s.symbol
                  ORDER BY latest.id DESC LIMIT 1)
           FROM stocks AS s
          WHERE s.user_id = ?1
          GROUP BY s.symbol
         HAVING SUM(s.shares) > 0
          ORDER BY s.symbol",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Position {
            symbol: row.get(0)?,
            name: row.get(1)?,
            shares: row.get(2)?,
            last_price: decimal_column(row, 3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// All ledger rows for `user_id` in storage order.
pub fn trades(conn: &Connection, user_id: i64) -> Result<Vec<Trade>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, symbol, name, price, shares, kind, timestamp
           FROM stocks WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        let timestamp: String = row.get(7)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        Ok(Trade {
            id: row.get(0)?,
            user_id: row.get(1)?,
            symbol: row.get(2)?,
            name: row.get(3)?,
            price: decimal_column(row, 4)?,
            shares: row.get(5)?,
            kind: kind_column(row, 6)?,
            timestamp,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
