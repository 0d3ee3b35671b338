//! SQLite-backed store.
//!
//! The store is the engine's transactional collaborator: unique constraints
//! enforce the one-application-per-applicant and one-report-per-reporter
//! invariants, and conditional `UPDATE ... WHERE` statements provide the
//! compare-and-set guards the lifecycle transitions need. All multi-row
//! operations run inside a single transaction.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Actor, ActorRole, Application, ApplicationStatus, Deliverable, DeliverableStatus, LedgerEntry,
    LifecycleStatus, ModerationStatus, Report, Task,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS actors (
    id              TEXT PRIMARY KEY,
    role            TEXT NOT NULL,
    reputation      REAL NOT NULL DEFAULT 0,
    tasks_completed INTEGER NOT NULL DEFAULT 0,
    tasks_posted    INTEGER NOT NULL DEFAULT 0,
    capabilities    TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id                    TEXT PRIMARY KEY,
    poster_id             TEXT NOT NULL REFERENCES actors(id),
    title                 TEXT NOT NULL,
    description           TEXT NOT NULL,
    category              TEXT NOT NULL,
    budget                INTEGER NOT NULL,
    required_capabilities TEXT NOT NULL DEFAULT '[]',
    deadline              TEXT,
    lifecycle             TEXT NOT NULL,
    moderation            TEXT NOT NULL,
    flagged_issues        TEXT NOT NULL DEFAULT '[]',
    moderation_notes      TEXT,
    worker_id             TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    id             TEXT PRIMARY KEY,
    task_id        TEXT NOT NULL REFERENCES tasks(id),
    applicant_id   TEXT NOT NULL REFERENCES actors(id),
    proposal       TEXT NOT NULL,
    proposed_price INTEGER,
    status         TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (task_id, applicant_id)
);

CREATE TABLE IF NOT EXISTS deliverables (
    id           TEXT PRIMARY KEY,
    task_id      TEXT NOT NULL REFERENCES tasks(id),
    worker_id    TEXT NOT NULL REFERENCES actors(id),
    content      TEXT NOT NULL,
    status       TEXT NOT NULL,
    review_notes TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
    id          TEXT PRIMARY KEY,
    task_id     TEXT NOT NULL REFERENCES tasks(id),
    reporter_id TEXT NOT NULL REFERENCES actors(id),
    reason      TEXT NOT NULL,
    details     TEXT,
    created_at  TEXT NOT NULL,
    UNIQUE (task_id, reporter_id)
);

CREATE TABLE IF NOT EXISTS ledger_entries (
    task_id      TEXT PRIMARY KEY REFERENCES tasks(id),
    recipient_id TEXT NOT NULL REFERENCES actors(id),
    amount       INTEGER NOT NULL,
    fee          INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ratings (
    task_id    TEXT NOT NULL REFERENCES tasks(id),
    worker_id  TEXT NOT NULL REFERENCES actors(id),
    rating     INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (task_id, worker_id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_lifecycle ON tasks(lifecycle);
CREATE INDEX IF NOT EXISTS idx_applications_task ON applications(task_id);
CREATE INDEX IF NOT EXISTS idx_reports_task ON reports(task_id);
"#;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (and bootstrap) the database at `path`. `:memory:` works.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ----- actors -----

    /// Ensure an actor row exists for a resolved identity and return it.
    pub fn upsert_actor(&self, id: &str, role: ActorRole) -> Result<Actor> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO actors (id, role, reputation, created_at) VALUES (?1, ?2, 0, ?3)",
            params![id, role.as_str(), now_str()],
        )?;
        let actor = conn
            .query_row("SELECT * FROM actors WHERE id = ?1", params![id], actor_from_row)?;
        Ok(actor)
    }

    pub fn get_actor(&self, id: &str) -> Result<Option<Actor>> {
        let conn = self.lock();
        let actor = conn
            .query_row("SELECT * FROM actors WHERE id = ?1", params![id], actor_from_row)
            .optional()?;
        Ok(actor)
    }

    pub fn bump_tasks_posted(&self, id: &str) -> Result<()> {
        self.lock().execute(
            "UPDATE actors SET tasks_posted = tasks_posted + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // ----- tasks -----

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.lock().execute(
            "INSERT INTO tasks (id, poster_id, title, description, category, budget,
                required_capabilities, deadline, lifecycle, moderation, flagged_issues,
                moderation_notes, worker_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                task.id.to_string(),
                task.poster_id,
                task.title,
                task.description,
                task.category,
                task.budget as i64,
                to_json(&task.required_capabilities),
                task.deadline.map(|d| d.to_rfc3339()),
                task.lifecycle.as_str(),
                task.moderation.as_str(),
                to_json(&task.flagged_issues),
                task.moderation_notes,
                task.worker_id,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let conn = self.lock();
        let task = conn
            .query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id.to_string()],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_open_tasks(
        &self,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut out = Vec::new();
        match category {
            Some(cat) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE lifecycle = 'open' AND category = ?1
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![cat, limit, offset], task_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE lifecycle = 'open'
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt.query_map(params![limit, offset], task_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Conditional cancel: succeeds only while the task is still `open` and
    /// no worker has been selected.
    pub fn cancel_task(&self, task_id: Uuid) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE tasks SET lifecycle = 'cancelled', updated_at = ?1
             WHERE id = ?2 AND lifecycle = 'open' AND worker_id IS NULL",
            params![now_str(), task_id.to_string()],
        )?;
        Ok(n == 1)
    }

    /// Persist an extended-moderation verdict, guarded on the moderation
    /// axis still being `pending`. Advances both axes together. Returns
    /// false when another resolution already won (idempotent replay).
    pub fn resolve_moderation(
        &self,
        task_id: Uuid,
        moderation: ModerationStatus,
        lifecycle: LifecycleStatus,
        issues: &[String],
        note: Option<&str>,
    ) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE tasks SET moderation = ?1, lifecycle = ?2, flagged_issues = ?3,
                moderation_notes = ?4, updated_at = ?5
             WHERE id = ?6 AND moderation = 'pending'",
            params![
                moderation.as_str(),
                lifecycle.as_str(),
                to_json(&issues.to_vec()),
                note,
                now_str(),
                task_id.to_string(),
            ],
        )?;
        Ok(n == 1)
    }

    /// Persist a manual moderator decision on a task held in
    /// `pending_review`. Same shape as `resolve_moderation` but guarded on
    /// the review queue instead of the pending state.
    pub fn resolve_manual_review(
        &self,
        task_id: Uuid,
        moderation: ModerationStatus,
        lifecycle: LifecycleStatus,
        note: Option<&str>,
    ) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE tasks SET moderation = ?1, lifecycle = ?2, moderation_notes = ?3,
                updated_at = ?4
             WHERE id = ?5 AND moderation = 'pending_review'
               AND lifecycle = 'moderation_pending'",
            params![
                moderation.as_str(),
                lifecycle.as_str(),
                note,
                now_str(),
                task_id.to_string(),
            ],
        )?;
        Ok(n == 1)
    }

    /// Push an approved task back into review: `approved -> flagged` is the
    /// only path into `flagged`.
    pub fn flag_task(&self, task_id: Uuid, note: &str) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE tasks SET moderation = 'flagged', moderation_notes = ?1, updated_at = ?2
             WHERE id = ?3 AND moderation = 'approved'",
            params![note, now_str(), task_id.to_string()],
        )?;
        Ok(n == 1)
    }

    pub fn append_moderation_note(&self, task_id: Uuid, note: &str) -> Result<()> {
        self.lock().execute(
            "UPDATE tasks SET moderation_notes =
                COALESCE(moderation_notes || '; ', '') || ?1, updated_at = ?2
             WHERE id = ?3",
            params![note, now_str(), task_id.to_string()],
        )?;
        Ok(())
    }

    // ----- applications -----

    /// Insert a bid. A duplicate (task, applicant) pair surfaces as
    /// `Conflict` via the unique constraint.
    pub fn insert_application(&self, app: &Application) -> Result<()> {
        let result = self.lock().execute(
            "INSERT INTO applications (id, task_id, applicant_id, proposal, proposed_price,
                status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                app.id.to_string(),
                app.task_id.to_string(),
                app.applicant_id,
                app.proposal,
                app.proposed_price.map(|p| p as i64),
                app.status.as_str(),
                app.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::conflict("already applied to this task"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an applicant's existing bid on a task, if any.
    pub fn find_application(&self, task_id: Uuid, applicant_id: &str) -> Result<Option<Application>> {
        let conn = self.lock();
        let app = conn
            .query_row(
                "SELECT * FROM applications WHERE task_id = ?1 AND applicant_id = ?2",
                params![task_id.to_string(), applicant_id],
                application_from_row,
            )
            .optional()?;
        Ok(app)
    }

    pub fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let conn = self.lock();
        let app = conn
            .query_row(
                "SELECT * FROM applications WHERE id = ?1",
                params![id.to_string()],
                application_from_row,
            )
            .optional()?;
        Ok(app)
    }

    pub fn list_applications(&self, task_id: Uuid) -> Result<Vec<Application>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM applications WHERE task_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![task_id.to_string()], application_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Accept one application: the single conditional update the arbitration
    /// invariant rests on. In one transaction, guarded on the task still
    /// being `open`: select the worker, advance to `in_progress`, mark the
    /// application accepted, and reject every other pending application.
    /// Returns false when the guard fails (a concurrent accept won).
    pub fn accept_application(
        &self,
        task_id: Uuid,
        application_id: Uuid,
        worker_id: &str,
    ) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = now_str();

        let n = tx.execute(
            "UPDATE tasks SET lifecycle = 'in_progress', worker_id = ?1, updated_at = ?2
             WHERE id = ?3 AND lifecycle = 'open'",
            params![worker_id, now, task_id.to_string()],
        )?;
        if n == 0 {
            return Ok(false);
        }

        let n = tx.execute(
            "UPDATE applications SET status = 'accepted'
             WHERE id = ?1 AND status = 'pending'",
            params![application_id.to_string()],
        )?;
        if n == 0 {
            // Application was withdrawn or rejected between check and accept.
            return Ok(false);
        }

        tx.execute(
            "UPDATE applications SET status = 'rejected'
             WHERE task_id = ?1 AND status = 'pending' AND id != ?2",
            params![task_id.to_string(), application_id.to_string()],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Reject one still-pending application; no task state change.
    pub fn reject_application(&self, application_id: Uuid) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE applications SET status = 'rejected'
             WHERE id = ?1 AND status = 'pending'",
            params![application_id.to_string()],
        )?;
        Ok(n == 1)
    }

    // ----- deliverables -----

    /// Find-pending-or-create, plus the lifecycle advance, in one
    /// transaction guarded on the task still being `in_progress`. Returns
    /// the deliverable and whether it was newly created.
    pub fn submit_deliverable(
        &self,
        task_id: Uuid,
        worker_id: &str,
        content: &str,
    ) -> Result<Option<(Deliverable, bool)>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = now_str();

        let n = tx.execute(
            "UPDATE tasks SET lifecycle = 'awaiting_review', updated_at = ?1
             WHERE id = ?2 AND lifecycle = 'in_progress' AND worker_id = ?3",
            params![now, task_id.to_string(), worker_id],
        )?;
        if n == 0 {
            return Ok(None);
        }

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM deliverables
                 WHERE task_id = ?1 AND worker_id = ?2 AND status IN ('pending', 'revision_requested')",
                params![task_id.to_string(), worker_id],
                |row| row.get(0),
            )
            .optional()?;

        let (id, created) = match existing {
            Some(id) => {
                // Resubmission: update the existing record in place.
                tx.execute(
                    "UPDATE deliverables SET content = ?1, status = 'pending',
                        review_notes = NULL, updated_at = ?2
                     WHERE id = ?3",
                    params![content, now, id],
                )?;
                (id, false)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO deliverables (id, task_id, worker_id, content, status,
                        created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
                    params![id, task_id.to_string(), worker_id, content, now],
                )?;
                (id, true)
            }
        };

        let deliverable = tx.query_row(
            "SELECT * FROM deliverables WHERE id = ?1",
            params![id],
            deliverable_from_row,
        )?;
        tx.commit()?;
        Ok(Some((deliverable, created)))
    }

    pub fn get_deliverable(&self, id: Uuid) -> Result<Option<Deliverable>> {
        let conn = self.lock();
        let d = conn
            .query_row(
                "SELECT * FROM deliverables WHERE id = ?1",
                params![id.to_string()],
                deliverable_from_row,
            )
            .optional()?;
        Ok(d)
    }

    /// Approve a pending deliverable and settle the task in one transaction:
    /// deliverable approved, task completed, ledger entry written, worker
    /// stats updated, optional rating folded into the reputation mean.
    /// Returns the ledger entry, or None if the deliverable was no longer
    /// pending or the task not awaiting review.
    pub fn settle_approval(
        &self,
        deliverable_id: Uuid,
        task_id: Uuid,
        worker_id: &str,
        worker_amount: u64,
        fee: u64,
        rating: Option<u8>,
        notes: Option<&str>,
    ) -> Result<Option<LedgerEntry>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = now_str();

        let n = tx.execute(
            "UPDATE deliverables SET status = 'approved', review_notes = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![notes, now, deliverable_id.to_string()],
        )?;
        if n == 0 {
            return Ok(None);
        }

        let n = tx.execute(
            "UPDATE tasks SET lifecycle = 'completed', updated_at = ?1
             WHERE id = ?2 AND lifecycle = 'awaiting_review'",
            params![now, task_id.to_string()],
        )?;
        if n == 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO ledger_entries (task_id, recipient_id, amount, fee, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task_id.to_string(),
                worker_id,
                worker_amount as i64,
                fee as i64,
                now
            ],
        )?;

        tx.execute(
            "UPDATE actors SET tasks_completed = tasks_completed + 1 WHERE id = ?1",
            params![worker_id],
        )?;

        if let Some(rating) = rating {
            tx.execute(
                "INSERT OR REPLACE INTO ratings (task_id, worker_id, rating, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id.to_string(), worker_id, rating as i64, now],
            )?;
            // Reputation is the mean of all received ratings, one decimal.
            let mean: f64 = tx.query_row(
                "SELECT AVG(rating) FROM ratings WHERE worker_id = ?1",
                params![worker_id],
                |row| row.get(0),
            )?;
            let rounded = (mean * 10.0).round() / 10.0;
            tx.execute(
                "UPDATE actors SET reputation = ?1 WHERE id = ?2",
                params![rounded, worker_id],
            )?;
        }

        let entry = tx.query_row(
            "SELECT * FROM ledger_entries WHERE task_id = ?1",
            params![task_id.to_string()],
            ledger_from_row,
        )?;
        tx.commit()?;
        Ok(Some(entry))
    }

    /// Mark a pending deliverable `revision_requested` and put the task back
    /// in progress.
    pub fn settle_revision(
        &self,
        deliverable_id: Uuid,
        task_id: Uuid,
        notes: Option<&str>,
    ) -> Result<bool> {
        self.settle_non_approval(deliverable_id, task_id, "revision_requested", "in_progress", notes)
    }

    /// Mark a pending deliverable `rejected` and move the task to `disputed`.
    pub fn settle_rejection(
        &self,
        deliverable_id: Uuid,
        task_id: Uuid,
        notes: Option<&str>,
    ) -> Result<bool> {
        self.settle_non_approval(deliverable_id, task_id, "rejected", "disputed", notes)
    }

    fn settle_non_approval(
        &self,
        deliverable_id: Uuid,
        task_id: Uuid,
        deliverable_status: &str,
        lifecycle: &str,
        notes: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = now_str();

        let n = tx.execute(
            "UPDATE deliverables SET status = ?1, review_notes = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![deliverable_status, notes, now, deliverable_id.to_string()],
        )?;
        if n == 0 {
            return Ok(false);
        }
        let n = tx.execute(
            "UPDATE tasks SET lifecycle = ?1, updated_at = ?2
             WHERE id = ?3 AND lifecycle = 'awaiting_review'",
            params![lifecycle, now, task_id.to_string()],
        )?;
        if n == 0 {
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn get_ledger_entry(&self, task_id: Uuid) -> Result<Option<LedgerEntry>> {
        let conn = self.lock();
        let entry = conn
            .query_row(
                "SELECT * FROM ledger_entries WHERE task_id = ?1",
                params![task_id.to_string()],
                ledger_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    // ----- reports -----

    /// Insert a report; a duplicate (task, reporter) pair is a `Conflict`.
    /// Returns the number of distinct reports now held against the task.
    pub fn insert_report(&self, report: &Report) -> Result<u32> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO reports (id, task_id, reporter_id, reason, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.id.to_string(),
                report.task_id.to_string(),
                report.reporter_id,
                report.reason.as_str(),
                report.details,
                report.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::conflict("already reported this task"))
            }
            Err(e) => return Err(e.into()),
        }
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE task_id = ?1",
            params![report.task_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ----- row mapping -----

fn now_str() -> String {
    Utc::now().to_rfc3339()
}

fn to_json(v: &Vec<String>) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

fn from_json(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    s.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_enum<T>(idx: usize, s: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown enum value '{}'", s).into(),
        )
    })
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn actor_from_row(row: &Row<'_>) -> rusqlite::Result<Actor> {
    let role: String = row.get("role")?;
    let caps: String = row.get("capabilities")?;
    Ok(Actor {
        id: row.get("id")?,
        role: parse_enum(1, &role, ActorRole::parse)?,
        reputation: row.get("reputation")?,
        tasks_completed: row.get("tasks_completed")?,
        tasks_posted: row.get("tasks_posted")?,
        capabilities: from_json(&caps),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get("id")?;
    let caps: String = row.get("required_capabilities")?;
    let deadline: Option<String> = row.get("deadline")?;
    let lifecycle: String = row.get("lifecycle")?;
    let moderation: String = row.get("moderation")?;
    let issues: String = row.get("flagged_issues")?;
    let budget: i64 = row.get("budget")?;
    let created: String = row.get("created_at")?;
    let updated: String = row.get("updated_at")?;
    Ok(Task {
        id: parse_uuid(0, &id)?,
        poster_id: row.get("poster_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: row.get("category")?,
        budget: budget as u64,
        required_capabilities: from_json(&caps),
        deadline: deadline.as_deref().map(|d| parse_ts(7, d)).transpose()?,
        lifecycle: parse_enum(8, &lifecycle, LifecycleStatus::parse)?,
        moderation: parse_enum(9, &moderation, ModerationStatus::parse)?,
        flagged_issues: from_json(&issues),
        moderation_notes: row.get("moderation_notes")?,
        worker_id: row.get("worker_id")?,
        created_at: parse_ts(13, &created)?,
        updated_at: parse_ts(14, &updated)?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let id: String = row.get("id")?;
    let task_id: String = row.get("task_id")?;
    let status: String = row.get("status")?;
    let price: Option<i64> = row.get("proposed_price")?;
    let created: String = row.get("created_at")?;
    Ok(Application {
        id: parse_uuid(0, &id)?,
        task_id: parse_uuid(1, &task_id)?,
        applicant_id: row.get("applicant_id")?,
        proposal: row.get("proposal")?,
        proposed_price: price.map(|p| p as u64),
        status: parse_enum(5, &status, ApplicationStatus::parse)?,
        created_at: parse_ts(6, &created)?,
    })
}

fn deliverable_from_row(row: &Row<'_>) -> rusqlite::Result<Deliverable> {
    let id: String = row.get("id")?;
    let task_id: String = row.get("task_id")?;
    let status: String = row.get("status")?;
    let created: String = row.get("created_at")?;
    let updated: String = row.get("updated_at")?;
    Ok(Deliverable {
        id: parse_uuid(0, &id)?,
        task_id: parse_uuid(1, &task_id)?,
        worker_id: row.get("worker_id")?,
        content: row.get("content")?,
        status: parse_enum(4, &status, DeliverableStatus::parse)?,
        review_notes: row.get("review_notes")?,
        created_at: parse_ts(6, &created)?,
        updated_at: parse_ts(7, &updated)?,
    })
}

fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let task_id: String = row.get("task_id")?;
    let amount: i64 = row.get("amount")?;
    let fee: i64 = row.get("fee")?;
    let created: String = row.get("created_at")?;
    Ok(LedgerEntry {
        task_id: parse_uuid(0, &task_id)?,
        recipient_id: row.get("recipient_id")?,
        amount: amount as u64,
        fee: fee as u64,
        created_at: parse_ts(4, &created)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReportReason;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn sample_task(poster: &str) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            poster_id: poster.to_string(),
            title: "Design a landing page".to_string(),
            description: "Responsive landing page with contact form".to_string(),
            category: "design".to_string(),
            budget: 10_000,
            required_capabilities: vec![],
            deadline: None,
            lifecycle: LifecycleStatus::Open,
            moderation: ModerationStatus::Approved,
            flagged_issues: vec![],
            moderation_notes: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_application(task_id: Uuid, applicant: &str) -> Application {
        Application {
            id: Uuid::new_v4(),
            task_id,
            applicant_id: applicant.to_string(),
            proposal: "I can do this".to_string(),
            proposed_price: None,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reopening_a_database_file_keeps_the_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gigboard.db");
        let path = path.to_str().unwrap();

        let task = sample_task("poster");
        {
            let store = Store::open(path).unwrap();
            store.upsert_actor("poster", ActorRole::Human).unwrap();
            store.insert_task(&task).unwrap();
        }

        let store = Store::open(path).unwrap();
        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.lifecycle, LifecycleStatus::Open);
        let poster = store.get_actor("poster").unwrap().unwrap();
        assert_eq!(poster.tasks_posted, 0);
    }

    #[test]
    fn task_round_trips() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        let task = sample_task("poster");
        store.insert_task(&task).unwrap();

        let loaded = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.budget, 10_000);
        assert_eq!(loaded.lifecycle, LifecycleStatus::Open);
        assert_eq!(loaded.moderation, ModerationStatus::Approved);
    }

    #[test]
    fn duplicate_application_is_conflict() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        store.upsert_actor("worker", ActorRole::Human).unwrap();
        let task = sample_task("poster");
        store.insert_task(&task).unwrap();

        store
            .insert_application(&sample_application(task.id, "worker"))
            .unwrap();
        let err = store
            .insert_application(&sample_application(task.id, "worker"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn accept_is_a_compare_and_set() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        store.upsert_actor("w1", ActorRole::Human).unwrap();
        store.upsert_actor("w2", ActorRole::Agent).unwrap();
        let task = sample_task("poster");
        store.insert_task(&task).unwrap();

        let a1 = sample_application(task.id, "w1");
        let a2 = sample_application(task.id, "w2");
        store.insert_application(&a1).unwrap();
        store.insert_application(&a2).unwrap();

        assert!(store.accept_application(task.id, a1.id, "w1").unwrap());
        // Second accept loses the guard.
        assert!(!store.accept_application(task.id, a2.id, "w2").unwrap());

        let apps = store.list_applications(task.id).unwrap();
        let accepted: Vec<_> = apps
            .iter()
            .filter(|a| a.status == ApplicationStatus::Accepted)
            .collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].applicant_id, "w1");
        // The other pending application was rejected in the same operation.
        assert!(apps
            .iter()
            .filter(|a| a.id != a1.id)
            .all(|a| a.status == ApplicationStatus::Rejected));

        let task = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(task.lifecycle, LifecycleStatus::InProgress);
        assert_eq!(task.worker_id.as_deref(), Some("w1"));
    }

    #[test]
    fn resubmission_updates_in_place() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        store.upsert_actor("w", ActorRole::Human).unwrap();
        let mut task = sample_task("poster");
        task.lifecycle = LifecycleStatus::InProgress;
        task.worker_id = Some("w".to_string());
        store.insert_task(&task).unwrap();

        let (first, created) = store
            .submit_deliverable(task.id, "w", "v1")
            .unwrap()
            .unwrap();
        assert!(created);

        // Revision requested, then resubmission reuses the record.
        assert!(store
            .settle_revision(first.id, task.id, Some("tighten the copy"))
            .unwrap());
        let (second, created) = store
            .submit_deliverable(task.id, "w", "v2")
            .unwrap()
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "v2");
        assert_eq!(second.status, DeliverableStatus::Pending);
    }

    #[test]
    fn settle_approval_writes_one_ledger_entry() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        store.upsert_actor("w", ActorRole::Human).unwrap();
        let mut task = sample_task("poster");
        task.lifecycle = LifecycleStatus::InProgress;
        task.worker_id = Some("w".to_string());
        store.insert_task(&task).unwrap();

        let (deliverable, _) = store
            .submit_deliverable(task.id, "w", "done")
            .unwrap()
            .unwrap();

        let entry = store
            .settle_approval(deliverable.id, task.id, "w", 9_900, 100, Some(5), None)
            .unwrap()
            .unwrap();
        assert_eq!(entry.amount + entry.fee, 10_000);

        // Replay is a no-op: the deliverable is no longer pending.
        assert!(store
            .settle_approval(deliverable.id, task.id, "w", 9_900, 100, None, None)
            .unwrap()
            .is_none());

        let worker = store.get_actor("w").unwrap().unwrap();
        assert_eq!(worker.tasks_completed, 1);
        assert_eq!(worker.reputation, 5.0);
    }

    #[test]
    fn report_counting_and_uniqueness() {
        let store = store();
        store.upsert_actor("poster", ActorRole::Human).unwrap();
        let task = sample_task("poster");
        store.insert_task(&task).unwrap();

        for (i, reporter) in ["r1", "r2"].iter().enumerate() {
            store.upsert_actor(reporter, ActorRole::Human).unwrap();
            let count = store
                .insert_report(&Report {
                    id: Uuid::new_v4(),
                    task_id: task.id,
                    reporter_id: reporter.to_string(),
                    reason: ReportReason::Spam,
                    details: None,
                    created_at: Utc::now(),
                })
                .unwrap();
            assert_eq!(count as usize, i + 1);
        }

        let err = store
            .insert_report(&Report {
                id: Uuid::new_v4(),
                task_id: task.id,
                reporter_id: "r1".to_string(),
                reason: ReportReason::Scam,
                details: None,
                created_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
