//! Task creation and reads.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::moderation;
use crate::ratelimit::GuardedAction;
use crate::types::{Actor, LifecycleStatus, ModerationStatus, Task};

use super::Engine;

const TITLE_MIN_LEN: usize = 8;
const DESCRIPTION_MIN_LEN: usize = 20;

#[derive(Debug, Clone)]
pub struct NewTaskInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: u64,
    pub deadline: Option<DateTime<Utc>>,
    pub required_capabilities: Vec<String>,
}

impl Engine {
    /// Create a task: rate limit, validate, quick moderation scan, then
    /// persist awaiting the extended moderation decision. Nothing is
    /// persisted until the limiter and the quick scan both pass.
    pub fn create_task(&self, poster: &Actor, input: NewTaskInput) -> Result<Task> {
        let decision = self.limiter.check(GuardedAction::CreateTask, &poster.id);
        if !decision.allowed {
            return Err(Error::RateLimited {
                retry_after_ms: decision.retry_after_ms,
            });
        }

        let title = input.title.trim();
        let description = input.description.trim();
        if title.len() < TITLE_MIN_LEN {
            return Err(Error::validation(format!(
                "title must be at least {} characters",
                TITLE_MIN_LEN
            )));
        }
        if description.len() < DESCRIPTION_MIN_LEN {
            return Err(Error::validation(format!(
                "description must be at least {} characters",
                DESCRIPTION_MIN_LEN
            )));
        }
        if input.category.trim().is_empty() {
            return Err(Error::validation("category is required"));
        }
        if input.budget == 0 {
            return Err(Error::validation("budget must be a positive integer"));
        }

        let prohibited = moderation::quick_check(title, description);
        if !prohibited.is_empty() {
            tracing::info!(
                poster = %poster.id,
                terms = ?prohibited,
                "task rejected by quick moderation scan"
            );
            return Err(Error::ModerationRejected { terms: prohibited });
        }

        // Softer matches ride along for the extended pass to weigh.
        let flagged_issues = moderation::review_triggers(title, description);

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            poster_id: poster.id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            category: input.category.trim().to_string(),
            budget: input.budget,
            required_capabilities: input.required_capabilities,
            deadline: input.deadline,
            lifecycle: LifecycleStatus::ModerationPending,
            moderation: ModerationStatus::Pending,
            flagged_issues,
            moderation_notes: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task)?;
        self.store.bump_tasks_posted(&poster.id)?;

        tracing::info!(task = %task.id, poster = %poster.id, "task created, moderation pending");
        Ok(task)
    }

    pub fn get_task(&self, task_id: Uuid) -> Result<Task> {
        self.store.get_task(task_id)?.ok_or(Error::NotFound("task"))
    }

    pub fn list_open_tasks(
        &self,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Task>> {
        self.store.list_open_tasks(category, limit.min(100), offset)
    }

    /// Poster cancels an open task before worker selection. Terminal.
    pub fn cancel_task(&self, actor: &Actor, task_id: Uuid) -> Result<Task> {
        let task = self.get_task(task_id)?;
        if task.poster_id != actor.id {
            return Err(Error::denied("only the poster may cancel a task"));
        }
        if task.lifecycle != LifecycleStatus::Open {
            return Err(Error::validation("task can only be cancelled while open"));
        }
        if !self.store.cancel_task(task_id)? {
            // A worker was selected between the check and the update.
            return Err(Error::conflict("task is no longer open"));
        }
        self.get_task(task_id)
    }
}
