//! PDF resource routes. Uploads are teacher-only and checked before any
//! bytes are read.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ApiError, body_stream, content_length, publish};
use crate::frame::now_ms;
use crate::hub::Topic;
use crate::services::resource::{self, Pdf, PdfDraft, ResourceError};
use crate::services::storage::compensate;
use crate::services::upload;
use crate::state::AppState;

pub(crate) fn resource_status(err: &ResourceError) -> StatusCode {
    match err {
        ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
        ResourceError::Forbidden | ResourceError::TeachersOnly => StatusCode::FORBIDDEN,
        ResourceError::Validation(_) => StatusCode::BAD_REQUEST,
        ResourceError::Storage(e) => super::storage_status(e),
        ResourceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        Self::from_service(resource_status(&err), &err)
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(flatten)]
    pub draft: PdfDraft,
    pub filename: String,
}

/// `GET /api/pdfs`
pub async fn list_pdfs(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<Pdf>>, ApiError> {
    Ok(Json(resource::list_pdfs(&state.pool).await?))
}

/// `POST /api/pdfs?name=&category=&description=&filename=`
pub async fn upload_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Pdf>), ApiError> {
    let draft = resource::check_upload(&auth.user, &query.draft)?;

    let key = resource::object_key(&query.filename, now_ms());
    let stored = upload::upload(&state, auth.user.id, &key, body_stream(body), content_length(&headers)).await?;
    let written = resource::create_pdf(&state.pool, auth.user.id, &draft, &stored).await;
    let created = compensate(state.storage.as_ref(), &key, written).await?;

    tracing::info!(pdf_id = %created.id, user_id = %auth.user.id, size = stored.size, "resource: uploaded");
    publish(&state, &Topic::Pdfs, "pdf:created", &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/pdfs/:id`
pub async fn get_pdf(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(pdf_id): Path<Uuid>,
) -> Result<Json<Pdf>, ApiError> {
    Ok(Json(resource::get_pdf(&state.pool, pdf_id).await?))
}

/// `PATCH /api/pdfs/:id`
pub async fn update_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pdf_id): Path<Uuid>,
    Json(draft): Json<PdfDraft>,
) -> Result<Json<Pdf>, ApiError> {
    let updated = resource::update_pdf(&state.pool, pdf_id, auth.user.id, &draft).await?;
    publish(&state, &Topic::Pdfs, "pdf:updated", &updated);
    Ok(Json(updated))
}

/// `DELETE /api/pdfs/:id`
pub async fn delete_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pdf_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    resource::delete_pdf(&state.pool, state.storage.as_ref(), pdf_id, auth.user.id).await?;
    publish(&state, &Topic::Pdfs, "pdf:deleted", &serde_json::json!({ "id": pdf_id }));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod tests;
