use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::achievement::listing::{self, Page, Pagination};
use crate::auth::claims::Claims;
use crate::auth::resolver;
use crate::errors::AppError;
use crate::models::achievement::{
    AchievementStatus, AchievementView, CreateAchievementRequest, RejectAchievementRequest,
    UpdateAchievementRequest,
};
use crate::reports::history::{self, HistoryEntry};
use crate::state::AppState;
use crate::upload;

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<AchievementStatus>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub data: Vec<AchievementView>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub id: Uuid,
    pub status: AchievementStatus,
    pub history: Vec<HistoryEntry>,
}

/// POST /api/v1/achievements
pub async fn handle_create(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<CreateAchievementRequest>,
) -> Result<(StatusCode, Json<AchievementView>), AppError> {
    let view = state.lifecycle.create(&claims, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/achievements
pub async fn handle_list(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let page = Page::from_params(params.page, params.page_size);
    let (references, pagination) = listing::scoped_references(
        state.references.as_ref(),
        state.directory.as_ref(),
        &claims,
        params.status,
        page,
    )
    .await?;
    let data = listing::build_views(state.achievements.as_ref(), references).await?;
    Ok(Json(ListResponse { data, pagination }))
}

/// GET /api/v1/achievements/:id
pub async fn handle_get(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<AchievementView>, AppError> {
    let view = state.lifecycle.get(&claims, id).await?;
    Ok(Json(view))
}

/// PUT /api/v1/achievements/:id
pub async fn handle_update(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAchievementRequest>,
) -> Result<Json<AchievementView>, AppError> {
    let view = state.lifecycle.update(&claims, id, req).await?;
    Ok(Json(view))
}

/// DELETE /api/v1/achievements/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/achievements/:id/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reference = state.lifecycle.submit(&claims, id).await?;
    Ok(Json(json!({
        "id": reference.id,
        "status": reference.status,
        "submitted_at": reference.submitted_at,
    })))
}

/// POST /api/v1/achievements/:id/verify
pub async fn handle_verify(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reference = state.lifecycle.verify(&claims, id).await?;
    Ok(Json(json!({
        "id": reference.id,
        "status": reference.status,
        "verified_at": reference.verified_at,
        "verified_by": reference.verified_by,
    })))
}

/// POST /api/v1/achievements/:id/reject
pub async fn handle_reject(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectAchievementRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reference = state
        .lifecycle
        .reject(&claims, id, &req.rejection_note)
        .await?;
    Ok(Json(json!({
        "id": reference.id,
        "status": reference.status,
        "rejected_at": reference.rejected_at,
        "rejected_by": reference.rejected_by,
        "rejection_note": reference.rejection_note,
    })))
}

/// POST /api/v1/achievements/:id/attachments (multipart, field name "file")
pub async fn handle_upload_attachment(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    // Owner and status checks run before any bytes are stored.
    let reference = state.lifecycle.attachment_target(&claims, id).await?;

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("attachment file name is missing".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read attachment: {e}")))?;
        file = Some((file_name, bytes.to_vec()));
        break;
    }
    let (file_name, bytes) =
        file.ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;

    let mime = upload::validate_attachment(&bytes)?;
    let attachment = upload::store_attachment(
        &state.s3,
        &state.config.s3_bucket,
        reference.id,
        &file_name,
        bytes,
        mime,
    )
    .await?;

    if let Err(e) = state.lifecycle.append_attachment(&reference, &attachment).await {
        // The uploaded object has no record pointing at it; remove it.
        upload::discard_attachment(&state.s3, &state.config.s3_bucket, &attachment.file_url).await;
        return Err(e);
    }

    Ok((StatusCode::CREATED, Json(json!({ "attachment": attachment }))))
}

/// GET /api/v1/achievements/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let reference = state
        .references
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("achievement not found".to_string()))?;
    resolver::authorize_read(state.directory.as_ref(), &claims, reference.student_id).await?;
    let history = history::reconstruct(state.directory.as_ref(), &reference).await?;
    Ok(Json(HistoryResponse {
        id: reference.id,
        status: reference.status,
        history,
    }))
}
