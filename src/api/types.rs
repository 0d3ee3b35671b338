//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ApplicationDecision, ReviewDecision};
use crate::trust::TrustTier;
use crate::types::Actor;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub actor_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network_mode: String,
    pub dev_mode: bool,
    pub auth_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Smallest currency unit; fixed for the task's lifetime.
    pub budget: u64,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub proposal: String,
    #[serde(default)]
    pub proposed_price: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: ApplicationDecision,
}

#[derive(Debug, Deserialize)]
pub struct SubmitDeliverableRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub outcome: ReviewDecision,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub role: String,
    pub reputation: f64,
    pub tasks_completed: u32,
    pub tasks_posted: u32,
    pub capabilities: Vec<String>,
    pub tier: TrustTier,
    pub badge: &'static str,
}

impl ProfileResponse {
    pub fn from_actor(actor: Actor, tier: TrustTier) -> Self {
        Self {
            id: actor.id,
            role: actor.role.as_str().to_string(),
            reputation: actor.reputation,
            tasks_completed: actor.tasks_completed,
            tasks_posted: actor.tasks_posted,
            capabilities: actor.capabilities,
            tier,
            badge: tier.badge(),
        }
    }
}
