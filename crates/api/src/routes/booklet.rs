//! Route definitions for booklets, mounted at `/booklets`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use hostbook_core::media::MAX_UPLOAD_BYTES;

use crate::handlers::{booklet, editor, guest, publication};
use crate::state::AppState;

/// Headroom for multipart framing around the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Operator routes (Bearer token required).
///
/// ```text
/// GET, POST  /                         -> list_booklets, create_booklet
/// GET, DELETE /{id}                    -> get_booklet, delete_booklet
/// PUT    /{id}/autosave                -> schedule_patch
/// POST   /{id}/autosave/flush          -> flush
/// PUT    /{id}/wizard/step             -> set_step
/// DELETE /{id}/session                 -> close_session
/// POST   /{id}/gallery/upload          -> upload_gallery_image
/// POST   /{id}/publish                 -> publish
/// POST   /{id}/pin/regenerate          -> regenerate_pin
/// POST   /{id}/disable                 -> disable
/// POST   /{id}/enable                  -> enable
/// ```
pub fn owner_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(booklet::list_booklets).post(booklet::create_booklet),
        )
        .route(
            "/{id}",
            get(booklet::get_booklet).delete(booklet::delete_booklet),
        )
        .route("/{id}/autosave", put(editor::schedule_patch))
        .route("/{id}/autosave/flush", post(editor::flush))
        .route("/{id}/wizard/step", put(editor::set_step))
        .route("/{id}/session", delete(editor::close_session))
        .route(
            "/{id}/gallery/upload",
            post(editor::upload_gallery_image)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/{id}/publish", post(publication::publish))
        .route("/{id}/pin/regenerate", post(publication::regenerate_pin))
        .route("/{id}/disable", post(publication::disable))
        .route("/{id}/enable", post(publication::enable))
}

/// Guest routes (no authentication).
///
/// ```text
/// GET  /by-code/{code}        -> view
/// GET  /by-code/{code}/wifi   -> reveal_wifi
/// POST /by-code/{code}/ask    -> ask
/// ```
pub fn guest_router() -> Router<AppState> {
    Router::new()
        .route("/by-code/{code}", get(guest::view))
        .route("/by-code/{code}/wifi", get(guest::reveal_wifi))
        .route("/by-code/{code}/ask", post(guest::ask))
}
