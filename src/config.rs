//! Server configuration.
//!
//! Loaded once from environment variables with sensible defaults; nothing
//! here is persisted. `NETWORK_MODE=practice` selects the sandbox network:
//! shorter posting cooldown and immediate auto-arbitration, for exercising
//! the full lifecycle in integration environments.

use serde::{Deserialize, Serialize};

/// Which network the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Live,
    Practice,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite database path; `:memory:` is accepted.
    pub database_path: String,
    pub jwt_secret: Option<String>,
    /// Shared secret presented by the extended-moderation callback and the
    /// automated application reviewer.
    pub moderation_secret: Option<String>,
    pub dev_mode: bool,
    pub network_mode: NetworkMode,

    /// Posting cooldown on the live network, milliseconds.
    pub post_cooldown_ms: u64,
    /// Posting cooldown on the practice network, milliseconds.
    pub practice_post_cooldown_ms: u64,
    pub apply_window_ms: u64,
    pub apply_max_per_window: u32,
    pub report_window_ms: u64,
    pub report_max_per_window: u32,

    /// Minimum proposal length for auto-acceptance of a first-time
    /// applicant on the live network.
    pub auto_accept_min_proposal_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            database_path: "gigboard.db".to_string(),
            jwt_secret: None,
            moderation_secret: None,
            dev_mode: false,
            network_mode: NetworkMode::Live,
            post_cooldown_ms: 5 * 60 * 1000,
            practice_post_cooldown_ms: 10 * 1000,
            apply_window_ms: 60 * 1000,
            apply_max_per_window: 10,
            report_window_ms: 60 * 60 * 1000,
            report_max_per_window: 5,
            auto_accept_min_proposal_len: 80,
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let network_mode = match std::env::var("NETWORK_MODE").as_deref() {
            Ok("practice") => NetworkMode::Practice,
            Ok("live") | Err(_) => NetworkMode::Live,
            Ok(other) => {
                tracing::warn!("unknown NETWORK_MODE '{}', defaulting to live", other);
                NetworkMode::Live
            }
        };

        Self {
            host: env_or("GIGBOARD_HOST", defaults.host),
            port: env_parse("GIGBOARD_PORT", defaults.port),
            database_path: env_or("DATABASE_PATH", defaults.database_path),
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            moderation_secret: std::env::var("MODERATION_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            dev_mode: std::env::var("DEV_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            network_mode,
            post_cooldown_ms: env_parse("POST_COOLDOWN_MS", defaults.post_cooldown_ms),
            practice_post_cooldown_ms: env_parse(
                "PRACTICE_POST_COOLDOWN_MS",
                defaults.practice_post_cooldown_ms,
            ),
            apply_window_ms: env_parse("APPLY_WINDOW_MS", defaults.apply_window_ms),
            apply_max_per_window: env_parse("APPLY_MAX_PER_WINDOW", defaults.apply_max_per_window),
            report_window_ms: env_parse("REPORT_WINDOW_MS", defaults.report_window_ms),
            report_max_per_window: env_parse(
                "REPORT_MAX_PER_WINDOW",
                defaults.report_max_per_window,
            ),
            auto_accept_min_proposal_len: env_parse(
                "AUTO_ACCEPT_MIN_PROPOSAL_LEN",
                defaults.auto_accept_min_proposal_len,
            ),
        }
    }

    /// The posting cooldown for the configured network.
    pub fn effective_post_cooldown_ms(&self) -> u64 {
        match self.network_mode {
            NetworkMode::Live => self.post_cooldown_ms,
            NetworkMode::Practice => self.practice_post_cooldown_ms,
        }
    }

    pub fn auth_required(&self) -> bool {
        !self.dev_mode
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("could not parse {}='{}', using default", key, v);
            default
        }),
        Err(_) => default,
    }
}
