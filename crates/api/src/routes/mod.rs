pub mod booklet;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /booklets                       owner: list, create
/// /booklets/{id}/...              owner: editing and publication
/// /booklets/by-code/{code}/...    guest: view, Wi-Fi reveal, assistant
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest(
        "/booklets",
        booklet::owner_router().merge(booklet::guest_router()),
    )
}
