// src/main.rs
use env_logger::{Builder, Env};
use finance::api::{self, AppState};
use finance::auth::Sessions;
use finance::config::Config;
use finance::db;
use finance::ledger::Ledger;
use finance::quotes::HttpQuoteProvider;
use log::{error, info};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Refusing to start: {}", e);
            process::exit(1);
        }
    };

    let db = match db::init(&config.database_path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    let quotes = match HttpQuoteProvider::new(&config.quote_api_url, Arc::new(config.api_key.clone())) {
        Ok(quotes) => quotes,
        Err(e) => {
            error!("Failed to build quote client: {}", e);
            process::exit(1);
        }
    };

    let state = AppState {
        ledger: Arc::new(Ledger::new(db, Arc::new(quotes))),
        sessions: Arc::new(Sessions::new(
            config.session_secret.clone(),
            config.session_ttl_secs,
        )),
    };

    info!("Starting the finance application...");
    info!("Server running on http://{}", config.bind_addr);
    warp::serve(api::routes(state)).run(config.bind_addr).await;
}
