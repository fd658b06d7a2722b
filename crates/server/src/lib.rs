//! ShareRideStories server library.
//!
//! Story API, magic-link sign-in and the storage adapters behind them,
//! exposed as a library so the binary and the integration tests share
//! one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use app::router;
pub use config::ServerConfig;
pub use state::AppState;
