// src/lib.rs
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod ledger;
pub mod models;
pub mod quotes;
pub mod views;
