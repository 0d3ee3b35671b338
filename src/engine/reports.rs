//! Abuse report aggregation.
//!
//! Reports are unique per (task, reporter). The third distinct report
//! flips an approved task's moderation status to `flagged`, re-opening
//! review regardless of where the lifecycle stands.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ratelimit::GuardedAction;
use crate::types::{Actor, ModerationStatus, Report, ReportReason};

use super::Engine;

const AUTO_FLAG_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub report: Report,
    /// Distinct reports now held against the task.
    pub total_reports: u32,
    /// True when this report pushed the task into `flagged`.
    pub flagged: bool,
}

impl Engine {
    pub fn report_task(
        &self,
        reporter: &Actor,
        task_id: Uuid,
        reason: ReportReason,
        details: Option<String>,
    ) -> Result<ReportOutcome> {
        let task = self.get_task(task_id)?;
        if task.poster_id == reporter.id {
            return Err(Error::validation("cannot report your own task"));
        }

        let decision = self.limiter.check(GuardedAction::Report, &reporter.id);
        if !decision.allowed {
            return Err(Error::RateLimited {
                retry_after_ms: decision.retry_after_ms,
            });
        }

        let report = Report {
            id: Uuid::new_v4(),
            task_id,
            reporter_id: reporter.id.clone(),
            reason,
            details,
            created_at: Utc::now(),
        };
        let total_reports = self.store.insert_report(&report)?;

        let mut flagged = false;
        if total_reports >= AUTO_FLAG_THRESHOLD {
            if task.moderation == ModerationStatus::Approved {
                let note = format!("auto-flagged after {} distinct reports", total_reports);
                flagged = self.store.flag_task(task_id, &note)?;
                if flagged {
                    tracing::warn!(task = %task_id, reports = total_reports, "task auto-flagged");
                }
            } else {
                // The moderation axis only enters `flagged` from `approved`;
                // for a task still under review, record the count for the
                // pending decision instead.
                self.store.append_moderation_note(
                    task_id,
                    &format!("{} distinct reports received", total_reports),
                )?;
            }
        }

        Ok(ReportOutcome {
            report,
            total_reports,
            flagged,
        })
    }
}
