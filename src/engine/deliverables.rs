//! Deliverable submission and the review pipeline that terminates the
//! lifecycle and writes the payment ledger entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ledger;
use crate::types::{Actor, Deliverable, LedgerEntry, LifecycleStatus};

use super::Engine;

/// Poster's verdict on a pending deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    RevisionRequested,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedDeliverable {
    pub deliverable: Deliverable,
    /// False when a pending record was updated in place (resubmission).
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub deliverable: Deliverable,
    pub task_lifecycle: LifecycleStatus,
    /// Present only for approvals: the single immutable payment record.
    pub payment: Option<LedgerEntry>,
}

impl Engine {
    /// Submit work. Only the selected worker, only while `in_progress`. A
    /// pending deliverable for this (task, worker) is updated in place;
    /// otherwise one is created. Advances the task to `awaiting_review`.
    pub fn submit_deliverable(
        &self,
        worker: &Actor,
        task_id: Uuid,
        content: String,
    ) -> Result<SubmittedDeliverable> {
        if content.trim().is_empty() {
            return Err(Error::validation("deliverable content is required"));
        }
        let task = self.get_task(task_id)?;
        if task.worker_id.as_deref() != Some(worker.id.as_str()) {
            return Err(Error::denied("only the selected worker may submit"));
        }
        if task.lifecycle != LifecycleStatus::InProgress {
            return Err(Error::validation("task is not in progress"));
        }

        match self.store.submit_deliverable(task_id, &worker.id, &content)? {
            Some((deliverable, created)) => {
                tracing::info!(task = %task_id, worker = %worker.id, "deliverable submitted");
                Ok(SubmittedDeliverable {
                    deliverable,
                    created,
                })
            }
            // The guard lost to a concurrent transition.
            None => Err(Error::conflict("task is not in progress")),
        }
    }

    /// Review a pending deliverable. Approval settles payment: the escrowed
    /// budget splits into `fee = floor(budget / 100)` and the worker amount,
    /// one ledger entry is written, and an optional 1-5 rating folds into
    /// the worker's reputation mean.
    pub fn review_deliverable(
        &self,
        actor: &Actor,
        deliverable_id: Uuid,
        decision: ReviewDecision,
        rating: Option<u8>,
        notes: Option<String>,
    ) -> Result<ReviewOutcome> {
        let deliverable = self
            .store
            .get_deliverable(deliverable_id)?
            .ok_or(Error::NotFound("deliverable"))?;
        let task = self.get_task(deliverable.task_id)?;
        if task.poster_id != actor.id {
            return Err(Error::denied("only the poster may review deliverables"));
        }
        if deliverable.status != crate::types::DeliverableStatus::Pending {
            return Err(Error::validation("deliverable is not pending review"));
        }
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(Error::validation("rating must be between 1 and 5"));
            }
            if decision != ReviewDecision::Approved {
                return Err(Error::validation("rating is only accepted on approval"));
            }
        }
        let notes = notes.as_deref();

        let payment = match decision {
            ReviewDecision::Approved => {
                let (worker_amount, fee) = ledger::split_budget(task.budget);
                let entry = self
                    .store
                    .settle_approval(
                        deliverable.id,
                        task.id,
                        &deliverable.worker_id,
                        worker_amount,
                        fee,
                        rating,
                        notes,
                    )?
                    .ok_or_else(|| Error::conflict("deliverable already reviewed"))?;
                tracing::info!(
                    task = %task.id,
                    worker = %deliverable.worker_id,
                    amount = entry.amount,
                    fee = entry.fee,
                    "task completed, payment settled"
                );
                Some(entry)
            }
            ReviewDecision::RevisionRequested => {
                if !self.store.settle_revision(deliverable.id, task.id, notes)? {
                    return Err(Error::conflict("deliverable already reviewed"));
                }
                None
            }
            ReviewDecision::Rejected => {
                if !self.store.settle_rejection(deliverable.id, task.id, notes)? {
                    return Err(Error::conflict("deliverable already reviewed"));
                }
                tracing::warn!(task = %task.id, "deliverable rejected, task disputed");
                None
            }
        };

        let deliverable = self
            .store
            .get_deliverable(deliverable_id)?
            .ok_or(Error::NotFound("deliverable"))?;
        let task = self.get_task(task.id)?;
        Ok(ReviewOutcome {
            deliverable,
            task_lifecycle: task.lifecycle,
            payment,
        })
    }
}
