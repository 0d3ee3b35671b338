//! Domain types for the marketplace lifecycle engine.
//!
//! A task carries two independent status axes: the lifecycle axis driven by
//! poster/worker actions and the moderation axis driven by the moderation
//! engine. They are never conflated; each advances only along its own table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a marketplace participant. Humans and automated agents are
/// symmetric everywhere in this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Human,
    Agent,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "human" => Some(Self::Human),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A marketplace participant as the engine sees one: the resolved identity
/// plus the stats the moderation and arbitration policies consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
    pub reputation: f64,
    pub tasks_completed: u32,
    pub tasks_posted: u32,
    pub capabilities: Vec<String>,
}

/// Lifecycle axis of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    ModerationPending,
    Open,
    Rejected,
    Cancelled,
    InProgress,
    AwaitingReview,
    Completed,
    Disputed,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModerationPending => "moderation_pending",
            Self::Open => "open",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::InProgress => "in_progress",
            Self::AwaitingReview => "awaiting_review",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moderation_pending" => Some(Self::ModerationPending),
            "open" => Some(Self::Open),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "in_progress" => Some(Self::InProgress),
            "awaiting_review" => Some(Self::AwaitingReview),
            "completed" => Some(Self::Completed),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }

    /// Terminal states are final; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Cancelled | Self::Completed | Self::Disputed
        )
    }

    /// The legal transition table. `awaiting_review -> in_progress` is the
    /// revision-requested path.
    pub fn can_advance_to(&self, next: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!(
            (self, next),
            (ModerationPending, Open)
                | (ModerationPending, Rejected)
                | (Open, Cancelled)
                | (Open, InProgress)
                | (InProgress, AwaitingReview)
                | (AwaitingReview, Completed)
                | (AwaitingReview, Disputed)
                | (AwaitingReview, InProgress)
        )
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderation axis of a task. Forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    PendingReview,
    Approved,
    Rejected,
    Flagged,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Flagged => "flagged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "pending_review" => Some(Self::PendingReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "flagged" => Some(Self::Flagged),
            _ => None,
        }
    }

    pub fn can_advance_to(&self, next: ModerationStatus) -> bool {
        use ModerationStatus::*;
        matches!(
            (self, next),
            (Pending, PendingReview)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (PendingReview, Approved)
                | (PendingReview, Rejected)
                | (Approved, Flagged)
        )
    }
}

impl std::fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A posted unit of work. The budget is fixed at creation in the smallest
/// currency unit and conceptually escrowed until deliverable approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub poster_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: u64,
    pub required_capabilities: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub lifecycle: LifecycleStatus,
    pub moderation: ModerationStatus,
    /// Issues recorded by the moderation passes (review triggers at
    /// creation, heuristic hits from the extended check).
    pub flagged_issues: Vec<String>,
    pub moderation_notes: Option<String>,
    /// Set once, when an application is accepted.
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A worker's bid on a task. Unique per (task, applicant); at most one per
/// task ever reaches `accepted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub task_id: Uuid,
    pub applicant_id: String,
    pub proposal: String,
    pub proposed_price: Option<u64>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    Pending,
    Approved,
    RevisionRequested,
    Rejected,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::RevisionRequested => "revision_requested",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "revision_requested" => Some(Self::RevisionRequested),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Submitted work awaiting poster review. At most one `pending` per
/// (task, worker); resubmission updates the pending record in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub task_id: Uuid,
    pub worker_id: String,
    pub content: String,
    pub status: DeliverableStatus,
    /// Poster feedback recorded at review time.
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed vocabulary of report reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Scam,
    ProhibitedContent,
    Discrimination,
    OffPlatformPayment,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Scam => "scam",
            Self::ProhibitedContent => "prohibited_content",
            Self::Discrimination => "discrimination",
            Self::OffPlatformPayment => "off_platform_payment",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spam" => Some(Self::Spam),
            "scam" => Some(Self::Scam),
            "prohibited_content" => Some(Self::ProhibitedContent),
            "discrimination" => Some(Self::Discrimination),
            "off_platform_payment" => Some(Self::OffPlatformPayment),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An abuse report against a task. Unique per (task, reporter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub task_id: Uuid,
    pub reporter_id: String,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Immutable payment record, written exactly once per completed task.
/// Invariant: `fee + amount == budget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub task_id: Uuid,
    pub recipient_id: String,
    pub amount: u64,
    pub fee: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transition_table() {
        use LifecycleStatus::*;
        assert!(ModerationPending.can_advance_to(Open));
        assert!(ModerationPending.can_advance_to(Rejected));
        assert!(Open.can_advance_to(Cancelled));
        assert!(Open.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(AwaitingReview));
        assert!(AwaitingReview.can_advance_to(Completed));
        assert!(AwaitingReview.can_advance_to(Disputed));
        assert!(AwaitingReview.can_advance_to(InProgress));

        // No shortcuts and no leaving terminal states.
        assert!(!ModerationPending.can_advance_to(InProgress));
        assert!(!Open.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(InProgress));
        assert!(!Cancelled.can_advance_to(Open));
        assert!(!Disputed.can_advance_to(Completed));
        assert!(!Rejected.can_advance_to(Open));
    }

    #[test]
    fn terminal_states_are_final() {
        use LifecycleStatus::*;
        for terminal in [Rejected, Cancelled, Completed, Disputed] {
            assert!(terminal.is_terminal());
            for next in [
                ModerationPending,
                Open,
                Rejected,
                Cancelled,
                InProgress,
                AwaitingReview,
                Completed,
                Disputed,
            ] {
                assert!(!terminal.can_advance_to(next));
            }
        }
    }

    #[test]
    fn moderation_axis_is_forward_only() {
        use ModerationStatus::*;
        assert!(Pending.can_advance_to(Approved));
        assert!(Pending.can_advance_to(Rejected));
        assert!(Pending.can_advance_to(PendingReview));
        assert!(PendingReview.can_advance_to(Approved));
        assert!(Approved.can_advance_to(Flagged));

        assert!(!Approved.can_advance_to(Pending));
        assert!(!Rejected.can_advance_to(Approved));
        assert!(!Flagged.can_advance_to(Approved));
        assert!(!Pending.can_advance_to(Flagged));
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [
            LifecycleStatus::ModerationPending,
            LifecycleStatus::Open,
            LifecycleStatus::AwaitingReview,
            LifecycleStatus::Disputed,
        ] {
            assert_eq!(LifecycleStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(
            ReportReason::parse("off_platform_payment"),
            Some(ReportReason::OffPlatformPayment)
        );
        assert_eq!(ReportReason::parse("bogus"), None);
    }
}
