//! Fixed-window rate limiting for guarded actions.
//!
//! Counters live behind the `CounterStore` trait. The in-memory store is
//! correct for a single serving process; a horizontally scaled deployment
//! would supply an implementation over a shared counter store instead.
//! Windows reset as a whole: the first action opens a window, and the count
//! drops back to zero only once the full window has elapsed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;

/// Actions counted against per-identity windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedAction {
    CreateTask,
    Apply,
    Report,
}

impl GuardedAction {
    fn key_prefix(&self) -> &'static str {
        match self {
            Self::CreateTask => "post",
            Self::Apply => "apply",
            Self::Report => "report",
        }
    }
}

/// Per-action limit: at most `max` actions per `window_ms`.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub max: u32,
    pub window_ms: u64,
}

/// Outcome of a limiter check. On denial, `remaining` is zero and
/// `retry_after_ms` tells the caller how long to back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: u64,
}

/// Keyed fixed-window counter storage.
pub trait CounterStore: Send + Sync {
    /// Record an attempt for `key` under `rule` at `now_ms`, returning the
    /// decision. Denied attempts do not extend the window.
    fn hit(&self, key: &str, rule: Rule, now_ms: u64) -> Decision;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_ms: u64,
    count: u32,
}

/// Process-local counter store.
#[derive(Default)]
pub struct InMemoryCounters {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounters {
    fn hit(&self, key: &str, rule: Rule, now_ms: u64) -> Decision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window {
            start_ms: now_ms,
            count: 0,
        });

        if now_ms.saturating_sub(window.start_ms) >= rule.window_ms {
            window.start_ms = now_ms;
            window.count = 0;
        }

        if window.count < rule.max {
            window.count += 1;
            Decision {
                allowed: true,
                remaining: rule.max - window.count,
                retry_after_ms: 0,
            }
        } else {
            Decision {
                allowed: false,
                remaining: 0,
                retry_after_ms: (window.start_ms + rule.window_ms).saturating_sub(now_ms),
            }
        }
    }
}

/// The limiter consulted before every guarded action.
pub struct RateLimiter {
    store: Box<dyn CounterStore>,
    rules: HashMap<GuardedAction, Rule>,
}

impl RateLimiter {
    /// Build from config with the in-memory store. The posting rule uses the
    /// cooldown for the configured network mode, one post per window.
    pub fn from_config(config: &Config) -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            GuardedAction::CreateTask,
            Rule {
                max: 1,
                window_ms: config.effective_post_cooldown_ms(),
            },
        );
        rules.insert(
            GuardedAction::Apply,
            Rule {
                max: config.apply_max_per_window,
                window_ms: config.apply_window_ms,
            },
        );
        rules.insert(
            GuardedAction::Report,
            Rule {
                max: config.report_max_per_window,
                window_ms: config.report_window_ms,
            },
        );
        Self::new(Box::new(InMemoryCounters::new()), rules)
    }

    pub fn new(store: Box<dyn CounterStore>, rules: HashMap<GuardedAction, Rule>) -> Self {
        Self { store, rules }
    }

    /// Check and count an action for `identity` at the current wall clock.
    pub fn check(&self, action: GuardedAction, identity: &str) -> Decision {
        self.check_at(action, identity, epoch_ms())
    }

    /// Clock-injected variant; `check` delegates here.
    pub fn check_at(&self, action: GuardedAction, identity: &str, now_ms: u64) -> Decision {
        let rule = match self.rules.get(&action) {
            Some(r) => *r,
            // Unconfigured actions are not limited.
            None => {
                return Decision {
                    allowed: true,
                    remaining: u32::MAX,
                    retry_after_ms: 0,
                }
            }
        };
        let key = format!("{}:{}", action.key_prefix(), identity);
        self.store.hit(&key, rule, now_ms)
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        let mut rules = HashMap::new();
        rules.insert(GuardedAction::Apply, Rule { max, window_ms });
        RateLimiter::new(Box::new(InMemoryCounters::new()), rules)
    }

    #[test]
    fn allows_up_to_max_then_rejects() {
        let limiter = limiter(3, 1000);
        let now = 1_000_000;

        for i in 0..3 {
            let d = limiter.check_at(GuardedAction::Apply, "worker-1", now + i);
            assert!(d.allowed, "action {} should pass", i);
        }

        let d = limiter.check_at(GuardedAction::Apply, "worker-1", now + 10);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.retry_after_ms, 990);
    }

    #[test]
    fn window_resets_as_a_whole() {
        let limiter = limiter(2, 1000);
        let now = 5_000;

        assert!(limiter.check_at(GuardedAction::Apply, "w", now).allowed);
        assert!(limiter.check_at(GuardedAction::Apply, "w", now + 100).allowed);
        assert!(!limiter.check_at(GuardedAction::Apply, "w", now + 999).allowed);

        // One tick past the window: full quota again.
        assert!(limiter.check_at(GuardedAction::Apply, "w", now + 1000).allowed);
        assert!(limiter.check_at(GuardedAction::Apply, "w", now + 1001).allowed);
        assert!(!limiter.check_at(GuardedAction::Apply, "w", now + 1002).allowed);
    }

    #[test]
    fn identities_are_independent() {
        let limiter = limiter(1, 1000);
        let now = 0;

        assert!(limiter.check_at(GuardedAction::Apply, "a", now).allowed);
        assert!(limiter.check_at(GuardedAction::Apply, "b", now).allowed);
        assert!(!limiter.check_at(GuardedAction::Apply, "a", now + 1).allowed);
    }

    #[test]
    fn denied_attempts_do_not_extend_the_window() {
        let limiter = limiter(1, 1000);

        assert!(limiter.check_at(GuardedAction::Apply, "w", 0).allowed);
        for t in [200, 400, 800] {
            assert!(!limiter.check_at(GuardedAction::Apply, "w", t).allowed);
        }
        assert!(limiter.check_at(GuardedAction::Apply, "w", 1000).allowed);
    }

    #[test]
    fn unconfigured_action_is_unlimited() {
        let limiter = limiter(1, 1000);
        let d = limiter.check_at(GuardedAction::Report, "w", 0);
        assert!(d.allowed);
    }
}
