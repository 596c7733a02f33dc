// src/auth.rs
use crate::db::{self, Db};
use crate::error::AppError;
use crate::forms::{LoginRequest, RegisterRequest};
use crate::models::CurrentUser;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::task;

pub const SESSION_COOKIE: &str = "session";

const BAD_CREDENTIALS: &str = "invalid username and/or password";

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Issues and checks the signed session tokens carried in the session cookie.
pub struct Sessions {
    secret: Vec<u8>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(secret: Vec<u8>, ttl_secs: i64) -> Self {
        Sessions {
            secret,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn create_token(&self, user_id: i64) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + self.ttl).timestamp().max(0) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token)
    }

    /// Any token that is expired, tampered with or malformed means the
    /// request is simply not logged in.
    pub fn verify(&self, token: &str) -> Result<CurrentUser, AppError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthenticated)?;
        let id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthenticated)?;
        Ok(CurrentUser { id })
    }
}

/// `Set-Cookie` value carrying a session token. No Max-Age: the cookie lives
/// for the browser session and the token's `exp` bounds it server side.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token
    )
}

pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Runs Argon2 on the blocking pool so a hash never stalls a runtime worker.
async fn hash_off_runtime(password: String) -> Result<String, AppError> {
    task::spawn_blocking(move || hash_password(&password)).await?
}

async fn verify_off_runtime(hash: String, password: String) -> Result<bool, AppError> {
    Ok(task::spawn_blocking(move || verify_password(&hash, &password)).await?)
}

pub async fn register(db: &Db, request: RegisterRequest) -> Result<i64, AppError> {
    let username = request.username;
    let hash = hash_off_runtime(request.password).await?;
    let id = db
        .transaction(|tx| db::insert_user(tx, &username, &hash))
        .await?;
    info!("Registered user {} ({}).", username, id);
    Ok(id)
}

/// Unknown usernames and wrong passwords fail with the same error.
pub async fn login(db: &Db, request: LoginRequest) -> Result<i64, AppError> {
    let user = db
        .read(|conn| db::find_user_by_username(conn, &request.username))
        .await?;
    let user = match user {
        Some(user) => user,
        None => return Err(AppError::Auth(BAD_CREDENTIALS.to_string())),
    };
    if verify_off_runtime(user.hash, request.password).await? {
        info!("User {} logged in.", user.id);
        Ok(user.id)
    } else {
        Err(AppError::Auth(BAD_CREDENTIALS.to_string()))
    }
}
