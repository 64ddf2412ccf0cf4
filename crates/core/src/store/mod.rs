//! The draft store capability.
//!
//! Persistence is an external keyed document store. The engine only needs
//! upsert-by-id, a handful of filtered reads, and one atomic pin rotation;
//! [`DraftStore`] captures exactly that. [`memory::MemoryStore`] backs tests
//! and local development; the PostgreSQL implementation lives in
//! `hostbook-db`.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booklet::{Booklet, BookletStatus};
use crate::error::CoreError;
use crate::patch::SectionPatch;
use crate::types::{BookletId, DbId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or timed out; retrying may succeed.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// A uniqueness rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Any other backend failure; retrying will not help.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Access codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinStatus {
    Active,
    Revoked,
}

impl PinStatus {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            _ => Err(CoreError::Validation(format!(
                "Invalid pin status '{s}'. Must be one of: active, revoked"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

/// An access code granting guests read access to a published booklet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    pub code: String,
    pub booklet_id: BookletId,
    pub status: PinStatus,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Pin {
    pub fn new_active(booklet_id: BookletId, code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            booklet_id,
            status: PinStatus::Active,
            created_at: chrono::Utc::now(),
            revoked_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Insert a brand-new booklet.
    async fn insert_booklet(&self, booklet: &Booklet) -> StoreResult<()>;

    async fn find_booklet(&self, id: BookletId) -> StoreResult<Option<Booklet>>;

    /// Booklets created by `owner_id`, newest first.
    async fn list_booklets(&self, owner_id: DbId) -> StoreResult<Vec<Booklet>>;

    /// Upsert one scope's snapshot and record `wizard_step` in the same
    /// write. Re-sending an identical patch has no further effect.
    async fn upsert_section(
        &self,
        booklet_id: BookletId,
        patch: &SectionPatch,
        wizard_step: u8,
    ) -> StoreResult<()>;

    async fn set_wizard_step(&self, booklet_id: BookletId, step: u8) -> StoreResult<()>;

    async fn set_status(&self, booklet_id: BookletId, status: BookletStatus) -> StoreResult<()>;

    /// Delete a booklet and its children. Fails with `Conflict` while an
    /// active pin references it.
    async fn delete_booklet(&self, booklet_id: BookletId) -> StoreResult<()>;

    async fn active_pin(&self, booklet_id: BookletId) -> StoreResult<Option<Pin>>;

    /// Look up an active pin by its already-normalized code.
    async fn find_active_pin_by_code(&self, code: &str) -> StoreResult<Option<Pin>>;

    /// Every pin ever issued for a booklet, newest first.
    async fn list_pins(&self, booklet_id: BookletId) -> StoreResult<Vec<Pin>>;

    /// Atomically revoke any active pin of the booklet, insert `code` as the
    /// new active pin, and optionally move the booklet to `status`.
    /// Fails with `Conflict` if `code` is already active elsewhere.
    async fn rotate_pin(
        &self,
        booklet_id: BookletId,
        code: &str,
        status: Option<BookletStatus>,
    ) -> StoreResult<Pin>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Load a booklet and verify that `owner_id` created it.
///
/// Unknown ids are `NotFound`; someone else's booklet is a generic
/// `Forbidden` that does not describe what was withheld.
pub async fn load_owned(
    store: &dyn DraftStore,
    booklet_id: BookletId,
    owner_id: DbId,
) -> Result<Booklet, CoreError> {
    let booklet = store
        .find_booklet(booklet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Booklet", booklet_id))?;
    if booklet.owner_id != owner_id {
        return Err(CoreError::Forbidden("Access denied".to_string()));
    }
    Ok(booklet)
}
