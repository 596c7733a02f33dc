// src/config.rs
//
// Process configuration, read once from the environment at startup.

use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const DEFAULT_DATABASE_PATH: &str = "finance.db";
pub const DEFAULT_QUOTE_API_URL: &str = "https://cloud.iexapis.com/stable";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Token for the quote provider. Required.
    pub api_key: String,
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub quote_api_url: String,
    /// Signing key for session tokens. Random per process when unset.
    pub session_secret: Vec<u8>,
    pub session_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let get = |name: &str| non_empty(vars, name);

        let api_key = get("API_KEY")
            .ok_or(ConfigError {
                variable: "API_KEY",
                message: "not set".to_string(),
            })?
            .to_string();

        let bind_addr = get("BIND_ADDR")
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError {
                variable: "BIND_ADDR",
                message: e.to_string(),
            })?;

        let session_ttl_secs = match get("SESSION_TTL_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError {
                    variable: "SESSION_TTL_SECS",
                    message: format!("expected a positive number of seconds, got {:?}", raw),
                })?,
            None => DEFAULT_SESSION_TTL_SECS,
        };

        let session_secret = match get("SESSION_SECRET") {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        Ok(Config {
            api_key,
            database_path: PathBuf::from(get("DATABASE_PATH").unwrap_or(DEFAULT_DATABASE_PATH)),
            bind_addr,
            quote_api_url: get("QUOTE_API_URL")
                .unwrap_or(DEFAULT_QUOTE_API_URL)
                .to_string(),
            session_secret,
            session_ttl_secs,
        })
    }
}
