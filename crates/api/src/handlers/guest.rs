//! Unauthenticated guest endpoints, keyed by access code.
//!
//! Every failure to resolve a code is the same 404, whatever the cause.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use hostbook_core::assistant::answer_question;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionInput {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct Answer {
    pub answer: String,
}

/// GET /api/v1/booklets/by-code/{code}
///
/// The guest payload: public fields only. Gated fields are named under
/// `gated` without their values.
pub async fn view(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let payload = state.publication.guest_view(&code).await?;

    Ok(Json(DataResponse { data: payload }))
}

/// GET /api/v1/booklets/by-code/{code}/wifi
pub async fn reveal_wifi(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let credentials = state.publication.reveal_connectivity(&code).await?;

    Ok(Json(DataResponse { data: credentials }))
}

/// POST /api/v1/booklets/by-code/{code}/ask
///
/// Answer a guest question from the booklet content the assistant may see.
pub async fn ask(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(input): Json<QuestionInput>,
) -> AppResult<impl IntoResponse> {
    let completer = state
        .assistant
        .clone()
        .ok_or_else(|| AppError::Unavailable("The assistant is not configured".to_string()))?;
    let booklet = state.publication.resolve(&code).await?;
    let answer = answer_question(completer.as_ref(), &booklet, &input.question).await?;

    Ok(Json(DataResponse {
        data: Answer { answer },
    }))
}
