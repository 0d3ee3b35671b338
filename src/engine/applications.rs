//! Application arbitration: competing bids, single-worker selection.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NetworkMode;
use crate::error::{Error, Result};
use crate::ratelimit::GuardedAction;
use crate::types::{Actor, Application, ApplicationStatus, LifecycleStatus};

use super::Engine;

/// What a poster asks for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationDecision {
    Accepted,
    Rejected,
}

/// Result of a poster decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub application: Application,
    pub task_lifecycle: LifecycleStatus,
}

/// Result of the automated reviewer's pass over one application.
#[derive(Debug, Clone, Serialize)]
pub struct AutoReviewOutcome {
    pub application: Application,
    /// True when the policy accepted the application; false means it was
    /// left pending for a manual decision.
    pub accepted: bool,
}

impl Engine {
    /// Submit a bid. One application per (task, applicant); a repeat is a
    /// Conflict the caller should read as already-applied.
    pub fn apply(
        &self,
        applicant: &Actor,
        task_id: Uuid,
        proposal: String,
        proposed_price: Option<u64>,
    ) -> Result<Application> {
        let task = self.get_task(task_id)?;
        if task.poster_id == applicant.id {
            return Err(Error::validation("cannot apply to your own task"));
        }
        // The already-applied signal wins over the state check: a repeat
        // bid is a Conflict even once the task has left `open`.
        if self.store.find_application(task_id, &applicant.id)?.is_some() {
            return Err(Error::conflict("already applied to this task"));
        }
        if task.lifecycle != LifecycleStatus::Open {
            return Err(Error::validation("task is not open for applications"));
        }
        if proposal.trim().is_empty() {
            return Err(Error::validation("proposal text is required"));
        }

        let decision = self.limiter.check(GuardedAction::Apply, &applicant.id);
        if !decision.allowed {
            return Err(Error::RateLimited {
                retry_after_ms: decision.retry_after_ms,
            });
        }

        let application = Application {
            id: Uuid::new_v4(),
            task_id,
            applicant_id: applicant.id.clone(),
            proposal,
            proposed_price,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_application(&application)?;
        tracing::debug!(task = %task_id, applicant = %applicant.id, "application submitted");
        Ok(application)
    }

    pub fn list_task_applications(&self, actor: &Actor, task_id: Uuid) -> Result<Vec<Application>> {
        let task = self.get_task(task_id)?;
        if task.poster_id != actor.id {
            return Err(Error::denied("only the poster may list applications"));
        }
        self.store.list_applications(task_id)
    }

    /// Poster accepts or rejects one application.
    ///
    /// Accept runs as a single conditional update keyed on the task still
    /// being `open`: set the worker, advance to `in_progress`, and reject
    /// every other pending application atomically. A losing concurrent
    /// accept observes a failed precondition, never corrupted state.
    pub fn decide_application(
        &self,
        actor: &Actor,
        application_id: Uuid,
        decision: ApplicationDecision,
    ) -> Result<DecisionOutcome> {
        let application = self
            .store
            .get_application(application_id)?
            .ok_or(Error::NotFound("application"))?;
        let task = self.get_task(application.task_id)?;
        if task.poster_id != actor.id {
            return Err(Error::denied("only the poster may decide applications"));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(Error::validation("application is not pending"));
        }

        match decision {
            ApplicationDecision::Accepted => {
                if task.lifecycle != LifecycleStatus::Open {
                    return Err(Error::validation("task is no longer open"));
                }
                let won = self.store.accept_application(
                    task.id,
                    application.id,
                    &application.applicant_id,
                )?;
                if !won {
                    return Err(Error::conflict("task is no longer open"));
                }
                tracing::info!(
                    task = %task.id,
                    worker = %application.applicant_id,
                    "worker selected"
                );
            }
            ApplicationDecision::Rejected => {
                if !self.store.reject_application(application.id)? {
                    return Err(Error::validation("application is not pending"));
                }
            }
        }

        let application = self
            .store
            .get_application(application_id)?
            .ok_or(Error::NotFound("application"))?;
        let task = self.get_task(task.id)?;
        Ok(DecisionOutcome {
            application,
            task_lifecycle: task.lifecycle,
        })
    }

    /// Automated reviewer policy. On the practice network every pending
    /// application is accepted immediately; on the live network an
    /// application is accepted only when the proposal is substantial or the
    /// applicant has prior completed tasks. Anything else stays pending for
    /// a manual decision.
    pub fn auto_review_application(&self, application_id: Uuid) -> Result<AutoReviewOutcome> {
        let application = self
            .store
            .get_application(application_id)?
            .ok_or(Error::NotFound("application"))?;
        if application.status != ApplicationStatus::Pending {
            return Ok(AutoReviewOutcome {
                accepted: application.status == ApplicationStatus::Accepted,
                application,
            });
        }
        let task = self.get_task(application.task_id)?;
        if task.lifecycle != LifecycleStatus::Open {
            return Ok(AutoReviewOutcome {
                application,
                accepted: false,
            });
        }

        let accept = match self.config.network_mode {
            NetworkMode::Practice => true,
            NetworkMode::Live => {
                let substantial =
                    application.proposal.len() >= self.config.auto_accept_min_proposal_len;
                let proven = self
                    .store
                    .get_actor(&application.applicant_id)?
                    .map(|a| a.tasks_completed > 0)
                    .unwrap_or(false);
                substantial || proven
            }
        };

        if !accept {
            return Ok(AutoReviewOutcome {
                application,
                accepted: false,
            });
        }

        let won =
            self.store
                .accept_application(task.id, application.id, &application.applicant_id)?;
        let application = self
            .store
            .get_application(application_id)?
            .ok_or(Error::NotFound("application"))?;
        Ok(AutoReviewOutcome {
            application,
            accepted: won,
        })
    }
}
