//! Personal study plans: a named checklist of tasks with a deadline.
//!
//! Plans are private to their owner; every query is scoped by `user_id`, so
//! another user's plan is indistinguishable from a missing one. Status
//! changes are collected client-side in a [`TaskStatusDraft`] and saved as
//! one bulk replacement of the `tasks` array.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validate::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StudyPlanError {
    #[error("study plan not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StudyPlanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PLAN_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// TASKS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
}

/// Fraction of tasks marked done, in `[0, 1]`. Zero tasks yields `0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    (done as f64 / tasks.len() as f64).clamp(0.0, 1.0)
}

/// Buffered status edits for one plan, saved in a single write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TaskStatusDraft {
    statuses: Vec<TaskStatus>,
}

impl TaskStatusDraft {
    /// Start from the plan's current statuses.
    #[cfg(test)]
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        Self { statuses: tasks.iter().map(|t| t.status).collect() }
    }

    #[cfg(test)]
    #[must_use]
    pub fn from_statuses(statuses: Vec<TaskStatus>) -> Self {
        Self { statuses }
    }

    /// # Errors
    ///
    /// Out-of-range index.
    #[cfg(test)]
    pub fn set(&mut self, index: usize, status: TaskStatus) -> Result<(), ValidationError> {
        let slot = self
            .statuses
            .get_mut(index)
            .ok_or_else(|| ValidationError::invalid("tasks", format!("no task at index {index}")))?;
        *slot = status;
        Ok(())
    }

    #[cfg(test)]
    #[must_use]
    pub fn statuses(&self) -> &[TaskStatus] {
        &self.statuses
    }

    /// Task list with the buffered statuses applied, names unchanged.
    ///
    /// # Errors
    ///
    /// The draft and the task list must have the same length.
    pub fn apply(&self, tasks: &[Task]) -> Result<Vec<Task>, ValidationError> {
        if self.statuses.len() != tasks.len() {
            return Err(ValidationError::invalid(
                "tasks",
                format!("expected {} statuses, got {}", tasks.len(), self.statuses.len()),
            ));
        }
        Ok(tasks
            .iter()
            .zip(&self.statuses)
            .map(|(task, &status)| Task { name: task.name.clone(), status })
            .collect())
    }
}

// =============================================================================
// PLANS
// =============================================================================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StudyPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_name: String,
    pub description: String,
    pub tasks: Json<Vec<Task>>,
    pub deadline: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Wire view of a plan with its progress figures.
#[derive(Debug, Clone, Serialize)]
pub struct StudyPlanView {
    pub id: Uuid,
    pub plan_name: String,
    pub description: String,
    pub tasks: Vec<Task>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub done: usize,
    pub total: usize,
    pub progress: f64,
}

impl From<StudyPlan> for StudyPlanView {
    fn from(plan: StudyPlan) -> Self {
        let tasks = plan.tasks.0;
        Self {
            id: plan.id,
            plan_name: plan.plan_name,
            description: plan.description,
            done: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
            total: tasks.len(),
            progress: progress(&tasks),
            tasks,
            deadline: plan.deadline,
            created_at: plan.created_at,
        }
    }
}

const PLAN_COLUMNS: &str = "id, user_id, plan_name, description, tasks, deadline, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct StudyPlanDraft {
    pub plan_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
}

impl StudyPlanDraft {
    /// A plan needs a name and at least one named task.
    ///
    /// # Errors
    ///
    /// Names the failing rule.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let plan_name = self.plan_name.trim();
        if plan_name.is_empty() || self.tasks.is_empty() {
            return Err(ValidationError::invalid("plan_name", "Please add a plan name and at least one task."));
        }
        let tasks = self
            .tasks
            .iter()
            .map(|t| {
                validate::required("task name", &t.name).map(|name| Task { name, status: t.status })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            plan_name: plan_name.to_owned(),
            description: self.description.trim().to_owned(),
            tasks,
            deadline: self.deadline,
        })
    }
}

/// # Errors
///
/// Validation errors or a database failure.
pub async fn create_plan(pool: &PgPool, user_id: Uuid, draft: &StudyPlanDraft) -> Result<StudyPlan, StudyPlanError> {
    let draft = draft.validate()?;
    let plan = sqlx::query_as::<_, StudyPlan>(&format!(
        "INSERT INTO study_plans (id, user_id, plan_name, description, tasks, deadline)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {PLAN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&draft.plan_name)
    .bind(&draft.description)
    .bind(Json(&draft.tasks))
    .bind(draft.deadline)
    .fetch_one(pool)
    .await?;
    tracing::info!(%user_id, plan_id = %plan.id, tasks = draft.tasks.len(), "study plan: created");
    Ok(plan)
}

/// The caller's plans, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_plans(pool: &PgPool, user_id: Uuid) -> Result<Vec<StudyPlan>, StudyPlanError> {
    let rows = sqlx::query_as::<_, StudyPlan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE user_id = $1 ORDER BY created_at DESC, id ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// `NotFound` if missing or owned by someone else.
pub async fn get_plan(pool: &PgPool, plan_id: Uuid, user_id: Uuid) -> Result<StudyPlan, StudyPlanError> {
    sqlx::query_as::<_, StudyPlan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE id = $1 AND user_id = $2"
    ))
    .bind(plan_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StudyPlanError::NotFound(plan_id))
}

/// Apply buffered statuses and replace the task array in one write.
///
/// # Errors
///
/// `NotFound`, or a validation error when the status count does not match.
pub async fn save_statuses(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    draft: &TaskStatusDraft,
) -> Result<StudyPlan, StudyPlanError> {
    let mut tx = pool.begin().await?;
    let current: Option<Json<Vec<Task>>> =
        sqlx::query_scalar("SELECT tasks FROM study_plans WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(plan_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(Json(tasks)) = current else {
        return Err(StudyPlanError::NotFound(plan_id));
    };
    let updated = draft.apply(&tasks)?;

    let plan = sqlx::query_as::<_, StudyPlan>(&format!(
        "UPDATE study_plans SET tasks = $3 WHERE id = $1 AND user_id = $2 RETURNING {PLAN_COLUMNS}"
    ))
    .bind(plan_id)
    .bind(user_id)
    .bind(Json(&updated))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(plan)
}

/// # Errors
///
/// `NotFound` if nothing was deleted.
pub async fn delete_plan(pool: &PgPool, plan_id: Uuid, user_id: Uuid) -> Result<(), StudyPlanError> {
    let result = sqlx::query("DELETE FROM study_plans WHERE id = $1 AND user_id = $2")
        .bind(plan_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StudyPlanError::NotFound(plan_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "study_plan_test.rs"]
mod tests;
