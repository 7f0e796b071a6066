//! Study plan routes. Plans are private to their owner; another user's plan
//! id answers 404, never 403.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use super::ApiError;
use super::auth::AuthUser;
use crate::services::study_plan::{self, StudyPlanDraft, StudyPlanError, StudyPlanView, TaskStatusDraft};
use crate::state::AppState;

pub(crate) fn study_plan_status(err: &StudyPlanError) -> StatusCode {
    match err {
        StudyPlanError::NotFound(_) => StatusCode::NOT_FOUND,
        StudyPlanError::Validation(_) => StatusCode::BAD_REQUEST,
        StudyPlanError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StudyPlanError> for ApiError {
    fn from(err: StudyPlanError) -> Self {
        Self::from_service(study_plan_status(&err), &err)
    }
}

/// `GET /api/study-plans`
pub async fn list_plans(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<StudyPlanView>>, ApiError> {
    let plans = study_plan::list_plans(&state.pool, auth.user.id).await?;
    Ok(Json(plans.into_iter().map(StudyPlanView::from).collect()))
}

/// `POST /api/study-plans`
pub async fn create_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(draft): Json<StudyPlanDraft>,
) -> Result<(StatusCode, Json<StudyPlanView>), ApiError> {
    let plan = study_plan::create_plan(&state.pool, auth.user.id, &draft).await?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

/// `GET /api/study-plans/:id`
pub async fn get_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<StudyPlanView>, ApiError> {
    Ok(Json(study_plan::get_plan(&state.pool, plan_id, auth.user.id).await?.into()))
}

/// `PUT /api/study-plans/:id/tasks`: body is the full status array, one
/// entry per task in order.
pub async fn save_statuses(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(draft): Json<TaskStatusDraft>,
) -> Result<Json<StudyPlanView>, ApiError> {
    let plan = study_plan::save_statuses(&state.pool, plan_id, auth.user.id, &draft).await?;
    Ok(Json(plan.into()))
}

/// `DELETE /api/study-plans/:id`
pub async fn delete_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    study_plan::delete_plan(&state.pool, plan_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "study_plans_test.rs"]
mod tests;
