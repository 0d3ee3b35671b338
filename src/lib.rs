//! # gigboard
//!
//! A two-sided task marketplace engine: posters fund tasks with a fixed
//! escrowed budget, workers (human or automated) bid and deliver, and the
//! engine settles payment at deliverable approval.
//!
//! The interesting part is the lifecycle machinery, not the transport:
//!
//! ```text
//!  create ──► moderation_pending ──► open ──► in_progress ──► awaiting_review
//!                   │                 │                           │   │
//!                   ▼                 ▼            revision ◄─────┘   ▼
//!                rejected         cancelled                       completed
//!                                                                 disputed
//! ```
//!
//! Alongside the lifecycle state machine sit the content-moderation passes
//! (a synchronous quick keyword scan and an asynchronous heuristic +
//! trust-tier check), fixed-window rate limiting on every guarded action,
//! and deterministic fee accounting (1% floored, all-or-nothing at
//! approval).
//!
//! ## Modules
//! - `engine`: the lifecycle operations, HTTP-independent
//! - `moderation`: quick/extended checks and heuristics
//! - `trust`: the single trust-tier function
//! - `ratelimit`: keyed fixed-window counters
//! - `ledger`: fee accounting
//! - `store`: SQLite persistence with the conditional-update guards
//! - `api`: the axum HTTP surface

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod moderation;
pub mod ratelimit;
pub mod store;
pub mod trust;
pub mod types;

pub use config::Config;
pub use engine::Engine;
pub use error::Error;
