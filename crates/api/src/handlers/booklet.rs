//! Handlers for creating, listing, reading and deleting booklets.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hostbook_core::booklet::{Booklet, BookletStatus};
use hostbook_core::store::load_owned;
use hostbook_core::types::{BookletId, Timestamp};
use hostbook_events::{event_types, BookletEvent};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::Operator;
use crate::response::DataResponse;
use crate::state::AppState;

/// One row of the operator's booklet list.
#[derive(Debug, Serialize)]
pub struct BookletSummary {
    pub id: BookletId,
    pub status: BookletStatus,
    pub wizard_step: u8,
    pub property_name: String,
    pub updated_at: Timestamp,
}

impl From<&Booklet> for BookletSummary {
    fn from(booklet: &Booklet) -> Self {
        Self {
            id: booklet.id,
            status: booklet.status,
            wizard_step: booklet.wizard_step,
            property_name: booklet.identity.property_name.clone(),
            updated_at: booklet.updated_at,
        }
    }
}

/// POST /api/v1/booklets
///
/// Create an empty draft on wizard step 1 and open an editing session on it.
pub async fn create_booklet(
    operator: Operator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.start(operator.id).await?;
    let booklet = session.snapshot().await;

    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_CREATED)
            .with_booklet(booklet.id)
            .with_actor(operator.id),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: booklet })))
}

/// GET /api/v1/booklets
pub async fn list_booklets(
    operator: Operator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let booklets = state.store.list_booklets(operator.id).await?;
    let summaries: Vec<BookletSummary> = booklets.iter().map(BookletSummary::from).collect();

    Ok(Json(DataResponse { data: summaries }))
}

/// GET /api/v1/booklets/{id}
///
/// The full booklet, private fields included. While an editor session is
/// open its local copy is returned, so edits still waiting on their debounce
/// show up; the publication status always comes from the store.
pub async fn get_booklet(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let stored = load_owned(state.store.as_ref(), booklet_id, operator.id).await?;

    let booklet = match state.sessions.get(booklet_id).await {
        Some(session) => Booklet {
            status: stored.status,
            ..session.snapshot().await
        },
        None => stored,
    };

    Ok(Json(DataResponse { data: booklet }))
}

/// DELETE /api/v1/booklets/{id}
///
/// Refused with 409 while an access code is active.
pub async fn delete_booklet(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    load_owned(state.store.as_ref(), booklet_id, operator.id).await?;
    state.sessions.close(booklet_id, operator.id).await?;
    state.store.delete_booklet(booklet_id).await?;

    tracing::info!(%booklet_id, operator_id = operator.id, "Booklet deleted");
    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_DELETED)
            .with_booklet(booklet_id)
            .with_actor(operator.id),
    );

    Ok(StatusCode::NO_CONTENT)
}
