//! Handlers for the publication lifecycle: publish, code rotation,
//! disable and enable.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use hostbook_core::booklet::BookletStatus;
use hostbook_core::store::Pin;
use hostbook_core::types::{BookletId, Timestamp};
use hostbook_events::{event_types, BookletEvent};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::Operator;
use crate::response::DataResponse;
use crate::state::AppState;

/// The code handed to the operator for sharing with guests.
#[derive(Debug, Serialize)]
pub struct IssuedCode {
    pub booklet_id: BookletId,
    pub code: String,
    pub issued_at: Timestamp,
}

impl From<Pin> for IssuedCode {
    fn from(pin: Pin) -> Self {
        Self {
            booklet_id: pin.booklet_id,
            code: pin.code,
            issued_at: pin.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub booklet_id: BookletId,
    pub status: BookletStatus,
}

/// POST /api/v1/booklets/{id}/publish
///
/// Only allowed from the last wizard step, once every pending edit is saved.
pub async fn publish(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.open(booklet_id, operator.id).await?;
    let pin = session.publish(&state.publication).await?;

    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_PUBLISHED)
            .with_booklet(booklet_id)
            .with_actor(operator.id),
    );

    Ok(Json(DataResponse {
        data: IssuedCode::from(pin),
    }))
}

/// POST /api/v1/booklets/{id}/pin/regenerate
///
/// The previous code stops resolving immediately.
pub async fn regenerate_pin(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let pin = state
        .publication
        .regenerate(booklet_id, operator.id)
        .await?;

    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_PIN_REGENERATED)
            .with_booklet(booklet_id)
            .with_actor(operator.id),
    );

    Ok(Json(DataResponse {
        data: IssuedCode::from(pin),
    }))
}

/// POST /api/v1/booklets/{id}/disable
pub async fn disable(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let status = state.publication.disable(booklet_id, operator.id).await?;

    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_DISABLED)
            .with_booklet(booklet_id)
            .with_actor(operator.id),
    );

    Ok(Json(DataResponse {
        data: StatusChange { booklet_id, status },
    }))
}

/// POST /api/v1/booklets/{id}/enable
pub async fn enable(
    operator: Operator,
    State(state): State<AppState>,
    Path(booklet_id): Path<BookletId>,
) -> AppResult<impl IntoResponse> {
    let status = state.publication.enable(booklet_id, operator.id).await?;

    state.event_bus.publish(
        BookletEvent::new(event_types::BOOKLET_ENABLED)
            .with_booklet(booklet_id)
            .with_actor(operator.id),
    );

    Ok(Json(DataResponse {
        data: StatusChange { booklet_id, status },
    }))
}
