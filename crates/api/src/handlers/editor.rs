//! Handlers for the wizard editor: autosave, navigation, session teardown
//! and gallery uploads.
//!
//! Every handler goes through the booklet's [`EditorSession`], opened on
//! first use, so the operator's edits share one set of debounce timers.
//!
//! [`EditorSession`]: hostbook_core::editor::EditorSession

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hostbook_core::autosave::FlushReport;
use hostbook_core::booklet::GalleryItem;
use hostbook_core::media::downscale_if_oversized;
use hostbook_core::patch::{Scope, SectionPatch};
use hostbook_core::store::load_owned;
use hostbook_core::types::BookletId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Operator;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduledPatch {
    pub scope: Scope,
    /// Every scope still waiting to be written, this one included.
    pub pending_scopes: Vec<Scope>,
}

#[derive(Debug, Deserialize)]
pub struct StepInput {
    pub step: u8,
}

/// PUT /api/v1/booklets/{id}/autosave
///
/// Apply one scope snapshot locally and schedule its debounced write.
pub async fn schedule_patch(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
    Json(patch): Json<SectionPatch>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(booklet_id, operator.id).await?;
    let scope = session.edit(patch).await?;
    let pending_scopes = session.pending_scopes().await;

    tracing::debug!(%booklet_id, %scope, pending = pending_scopes.len(), "Patch scheduled");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ScheduledPatch {
                scope,
                pending_scopes,
            },
        }),
    ))
}

/// POST /api/v1/booklets/{id}/autosave/flush
///
/// Write every pending scope now. Failures are reported, not raised.
pub async fn flush(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(booklet_id, operator.id).await?;
    let report = session.flush_all().await;

    Ok(Json(DataResponse { data: report }))
}

/// PUT /api/v1/booklets/{id}/wizard/step
pub async fn set_step(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
    Json(input): Json<StepInput>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(booklet_id, operator.id).await?;
    let navigation = session.go_to_number(input.step).await?;

    Ok(Json(DataResponse { data: navigation }))
}

/// DELETE /api/v1/booklets/{id}/session
///
/// Flush and close the editing session. Closing a booklet without an open
/// session returns an empty report.
pub async fn close_session(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    load_owned(state.store.as_ref(), booklet_id, operator.id).await?;
    let report = state
        .sessions
        .close(booklet_id, operator.id)
        .await?
        .unwrap_or_default();

    Ok(Json(DataResponse::<FlushReport> { data: report }))
}

/// POST /api/v1/booklets/{id}/gallery/upload
///
/// Multipart form with a `file` part and optional `alt` and `caption`
/// parts. The image is downscaled when oversized, stored, and appended to
/// the gallery through autosave.
pub async fn upload_gallery_image(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(booklet_id, operator.id).await?;

    let mut file: Option<Vec<u8>> = None;
    let mut alt: Option<String> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some(data.to_vec());
            }
            "alt" | "caption" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read {name}: {e}")))?;
                let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
                if name == "alt" {
                    alt = text;
                } else {
                    caption = text;
                }
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;
    let max_dimension = state.config.media_max_dimension;
    let image = tokio::task::spawn_blocking(move || downscale_if_oversized(&bytes, max_dimension))
        .await
        .map_err(|e| AppError::InternalError(format!("Image task failed: {e}")))??;

    let url = state.media.save(booklet_id, &image).await?;
    let item = GalleryItem {
        id: Uuid::new_v4(),
        url,
        alt,
        caption,
        order: session.snapshot().await.gallery.len() as i32,
    };
    session.edit(SectionPatch::GalleryItem(item.clone())).await?;

    tracing::info!(
        %booklet_id,
        item_id = %item.id,
        width = image.width,
        height = image.height,
        resized = image.resized,
        "Gallery image uploaded"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}
