//! The `access_pins` table.

use hostbook_core::error::CoreError;
use hostbook_core::store::{Pin, PinStatus};
use hostbook_core::types::{BookletId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PinRow {
    pub id: Uuid,
    pub booklet_id: BookletId,
    pub code: String,
    pub status: String,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl TryFrom<PinRow> for Pin {
    type Error = CoreError;

    fn try_from(row: PinRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            code: row.code,
            booklet_id: row.booklet_id,
            status: PinStatus::from_str_db(&row.status)?,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}
