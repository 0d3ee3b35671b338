//! HTTP surface over the lifecycle engine.

pub mod auth;
pub mod routes;
pub mod types;

pub use routes::{serve, AppState};
