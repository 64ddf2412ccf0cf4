//! Repository for the `booklet_events` table.

use hostbook_core::types::{BookletId, DbId};
use sqlx::PgPool;

use crate::models::event::EventRow;

const COLUMNS: &str = "id, event_type, booklet_id, actor_user_id, payload, created_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        booklet_id: Option<BookletId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO booklet_events (event_type, booklet_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(booklet_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Events of one booklet, newest first.
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
        limit: i64,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM booklet_events \
             WHERE booklet_id = $1 ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(booklet_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
