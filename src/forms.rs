// src/forms.rs
//
// Raw urlencoded bodies are decoded into `Option<String>` fields so a missing
// field never turns into an opaque 400 from the body filter. Each raw form is
// then converted into a validated request before any handler logic runs.

use crate::error::AppError;
use serde::Deserialize;

fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// A strictly positive whole number of shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareCount(i64);

impl ShareCount {
    pub fn get(self) -> i64 {
        self.0
    }

    pub fn parse(raw: Option<&str>) -> Result<ShareCount, AppError> {
        let raw = raw.map(str::trim).unwrap_or("");
        if raw.is_empty() {
            return Err(AppError::validation("Missing Shares"));
        }
        let shares: i64 = raw
            .parse()
            .map_err(|_| AppError::validation("Invalid Shares"))?;
        if shares <= 0 {
            return Err(AppError::validation("Shares must be greater than 0"));
        }
        Ok(ShareCount(shares))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTradeForm {
    pub symbol: Option<String>,
    pub shares: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub symbol: String,
    pub shares: ShareCount,
}

impl TryFrom<RawTradeForm> for TradeRequest {
    type Error = AppError;

    fn try_from(form: RawTradeForm) -> Result<Self, Self::Error> {
        let symbol = present(form.symbol).ok_or_else(|| AppError::validation("Missing Symbol"))?;
        let shares = ShareCount::parse(form.shares.as_deref())?;
        Ok(TradeRequest {
            symbol: symbol.trim().to_string(),
            shares,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawQuoteForm {
    pub symbol: Option<String>,
}

impl RawQuoteForm {
    pub fn symbol(self) -> Result<String, AppError> {
        present(self.symbol)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AppError::validation("Missing Symbol"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDepositForm {
    pub deposit: Option<String>,
}

/// A strictly positive whole-dollar deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRequest {
    pub amount: i64,
}

impl TryFrom<RawDepositForm> for DepositRequest {
    type Error = AppError;

    fn try_from(form: RawDepositForm) -> Result<Self, Self::Error> {
        let raw = present(form.deposit).ok_or_else(|| AppError::validation("Missing Amount"))?;
        let amount: i64 = raw
            .trim()
            .parse()
            .map_err(|_| AppError::validation("Invalid Amount"))?;
        if amount <= 0 {
            return Err(AppError::validation("Deposit must be greater than 0"));
        }
        Ok(DepositRequest { amount })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl TryFrom<RawLoginForm> for LoginRequest {
    type Error = AppError;

    fn try_from(form: RawLoginForm) -> Result<Self, Self::Error> {
        let username =
            present(form.username).ok_or_else(|| AppError::Auth("must provide username".into()))?;
        let password = form
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Auth("must provide password".into()))?;
        Ok(LoginRequest {
            username: username.trim().to_string(),
            password,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawRegisterForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub confirmation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

impl TryFrom<RawRegisterForm> for RegisterRequest {
    type Error = AppError;

    fn try_from(form: RawRegisterForm) -> Result<Self, Self::Error> {
        let username = present(form.username).ok_or_else(|| AppError::validation("Empty Username"))?;
        let password = form
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("Empty Password"))?;
        let confirmation = form
            .confirmation
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("Empty Confirmation Password"))?;
        if password != confirmation {
            return Err(AppError::validation("Passwords do not match"));
        }
        Ok(RegisterRequest {
            username: username.trim().to_string(),
            password,
        })
    }
}
