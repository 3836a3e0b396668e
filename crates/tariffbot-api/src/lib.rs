//! TariffBot HTTP API: axum server, route handlers, auth and rate limiting.
//!
//! Exposes the chat orchestrator, catalog lookups and the tariff calculator
//! as JSON endpoints on localhost.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
