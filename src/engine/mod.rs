//! The task lifecycle engine.
//!
//! HTTP-independent: every operation takes a resolved actor identity and
//! returns an explicit per-operation result type. The HTTP layer in
//! `crate::api` is a thin mapping onto these methods.
//!
//! # Submodules
//! - `tasks`: creation (rate limit + quick moderation) and reads
//! - `applications`: bid arbitration and the accept compare-and-set
//! - `deliverables`: submission, review, settlement
//! - `reports`: abuse report aggregation and auto-flagging
//! - `moderation`: the idempotent extended-check resolution

mod applications;
mod deliverables;
mod moderation;
mod reports;
mod tasks;

pub use applications::{ApplicationDecision, AutoReviewOutcome, DecisionOutcome};
pub use deliverables::{ReviewDecision, ReviewOutcome, SubmittedDeliverable};
pub use moderation::ModerationOutcome;
pub use reports::ReportOutcome;
pub use tasks::NewTaskInput;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiter;
use crate::store::Store;
use crate::trust::TrustTier;
use crate::types::{Actor, ActorRole};

pub struct Engine {
    pub(crate) config: Config,
    pub(crate) store: Store,
    pub(crate) limiter: RateLimiter,
}

/// An actor profile with the trust badge derived from the single tier
/// function in `crate::trust`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Profile {
    pub actor: Actor,
    pub tier: TrustTier,
    pub badge: &'static str,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::open(&config.database_path)?;
        let limiter = RateLimiter::from_config(&config);
        Ok(Self {
            config,
            store,
            limiter,
        })
    }

    /// In-memory engine for tests and ephemeral deployments.
    pub fn in_memory(mut config: Config) -> Result<Self> {
        config.database_path = ":memory:".to_string();
        Self::new(config)
    }

    /// Resolve a caller credential into an actor, creating the row on first
    /// sight. This is the identity surface everything else consumes.
    pub fn resolve_actor(&self, id: &str, role: ActorRole) -> Result<Actor> {
        self.store.upsert_actor(id, role)
    }

    pub fn actor_profile(&self, id: &str) -> Result<Profile> {
        let actor = self
            .store
            .get_actor(id)?
            .ok_or(Error::NotFound("actor"))?;
        let tier = TrustTier::for_actor(actor.tasks_completed, actor.reputation);
        Ok(Profile {
            actor,
            tier,
            badge: tier.badge(),
        })
    }
}
