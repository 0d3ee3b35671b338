//! The extended-moderation resolution surface.
//!
//! Any delivery mechanism (poller, queue consumer, direct callback) may
//! invoke `resolve_moderation` without at-most-once guarantees: the store
//! update is guarded on the moderation axis still being `pending`, so a
//! replay observes the recorded decision and changes nothing.

use serde::Serialize;
use uuid::Uuid;

use crate::moderation::{self, TaskContent};
use crate::types::{LifecycleStatus, ModerationStatus};

use crate::error::Result;

use super::Engine;

#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub task_id: Uuid,
    pub moderation: ModerationStatus,
    pub lifecycle: LifecycleStatus,
    pub issues: Vec<String>,
    /// False when the task's moderation was already resolved and this
    /// invocation was a no-op.
    pub applied: bool,
}

impl Engine {
    pub fn resolve_moderation(&self, task_id: Uuid) -> Result<ModerationOutcome> {
        let task = self.get_task(task_id)?;
        if task.moderation != ModerationStatus::Pending {
            return Ok(ModerationOutcome {
                task_id,
                moderation: task.moderation,
                lifecycle: task.lifecycle,
                issues: task.flagged_issues,
                applied: false,
            });
        }

        let (completed, reputation) = match self.store.get_actor(&task.poster_id)? {
            Some(poster) => (poster.tasks_completed, poster.reputation),
            None => (0, 0.0),
        };
        let verdict = moderation::extended_check(
            &TaskContent {
                title: &task.title,
                description: &task.description,
                budget: task.budget,
                flagged_issues: &task.flagged_issues,
            },
            completed,
            reputation,
        );

        let lifecycle = match verdict.status {
            ModerationStatus::Approved => LifecycleStatus::Open,
            ModerationStatus::Rejected => LifecycleStatus::Rejected,
            // Still awaiting a manual decision.
            _ => LifecycleStatus::ModerationPending,
        };

        let applied = self.store.resolve_moderation(
            task_id,
            verdict.status,
            lifecycle,
            &verdict.issues,
            verdict.note.as_deref(),
        )?;
        if !applied {
            // Lost a replay race; echo what the winner recorded.
            let task = self.get_task(task_id)?;
            return Ok(ModerationOutcome {
                task_id,
                moderation: task.moderation,
                lifecycle: task.lifecycle,
                issues: task.flagged_issues,
                applied: false,
            });
        }

        tracing::info!(
            task = %task_id,
            status = %verdict.status,
            "extended moderation resolved"
        );
        Ok(ModerationOutcome {
            task_id,
            moderation: verdict.status,
            lifecycle,
            issues: verdict.issues,
            applied: true,
        })
    }

    /// Manual moderator decision for a task held in `pending_review`.
    /// Forward-only like everything else on this axis: replays and
    /// decisions against already-resolved tasks are no-ops that echo the
    /// recorded state.
    pub fn resolve_manual_review(
        &self,
        task_id: Uuid,
        approve: bool,
        note: Option<&str>,
    ) -> Result<ModerationOutcome> {
        let task = self.get_task(task_id)?;
        let (moderation, lifecycle) = if approve {
            (ModerationStatus::Approved, LifecycleStatus::Open)
        } else {
            (ModerationStatus::Rejected, LifecycleStatus::Rejected)
        };

        let applied = self
            .store
            .resolve_manual_review(task_id, moderation, lifecycle, note)?;
        if !applied {
            let task = self.get_task(task_id)?;
            return Ok(ModerationOutcome {
                task_id,
                moderation: task.moderation,
                lifecycle: task.lifecycle,
                issues: task.flagged_issues,
                applied: false,
            });
        }

        tracing::info!(task = %task_id, approve, "manual moderation review resolved");
        Ok(ModerationOutcome {
            task_id,
            moderation,
            lifecycle,
            issues: task.flagged_issues,
            applied: true,
        })
    }
}
