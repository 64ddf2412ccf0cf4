//! Repository for the `access_pins` table.

use hostbook_core::store::{Pin, PinStatus};
use hostbook_core::types::BookletId;
use sqlx::{PgConnection, PgPool};

use crate::models::pin::PinRow;

const COLUMNS: &str = "id, booklet_id, code, status, created_at, revoked_at";

pub struct PinRepo;

impl PinRepo {
    pub async fn find_active_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Option<PinRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_pins WHERE booklet_id = $1 AND status = 'active'");
        sqlx::query_as::<_, PinRow>(&query)
            .bind(booklet_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active_by_code(pool: &PgPool, code: &str) -> Result<Option<PinRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_pins WHERE code = $1 AND status = 'active'");
        sqlx::query_as::<_, PinRow>(&query)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// Every pin of a booklet, newest first.
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Vec<PinRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_pins WHERE booklet_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PinRow>(&query)
            .bind(booklet_id)
            .fetch_all(pool)
            .await
    }

    pub async fn has_active(conn: &mut PgConnection, booklet_id: BookletId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM access_pins WHERE booklet_id = $1 AND status = 'active')",
        )
        .bind(booklet_id)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn revoke_active(
        conn: &mut PgConnection,
        booklet_id: BookletId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE access_pins SET status = 'revoked', revoked_at = now() \
             WHERE booklet_id = $1 AND status = 'active'",
        )
        .bind(booklet_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert a new pin. An active code already in use violates
    /// `uq_access_pins_active_code`.
    pub async fn insert(conn: &mut PgConnection, pin: &Pin) -> Result<PinRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_pins (id, booklet_id, code, status, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PinRow>(&query)
            .bind(pin.id)
            .bind(pin.booklet_id)
            .bind(&pin.code)
            .bind(PinStatus::Active.as_str())
            .bind(pin.created_at)
            .fetch_one(&mut *conn)
            .await
    }
}
