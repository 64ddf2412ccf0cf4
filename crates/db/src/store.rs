//! [`DraftStore`] backed by PostgreSQL.
//!
//! Each trait call maps onto one repository call or one short transaction.
//! sqlx failures are classified so the autosave engine only retries what
//! may succeed on a second attempt.

use async_trait::async_trait;
use hostbook_core::booklet::{Booklet, BookletStatus};
use hostbook_core::patch::SectionPatch;
use hostbook_core::store::{DraftStore, Pin, StoreError, StoreResult};
use hostbook_core::types::{BookletId, DbId};
use serde::Serialize;
use sqlx::PgConnection;

use crate::models::booklet::{BookletChildren, BookletRow};
use crate::repositories::{
    BookletRepo, EquipmentRepo, FaqRepo, GalleryRepo, PinRepo, PlaceRepo, SectionColumn,
};
use crate::{health_check, DbPool};

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const ADMIN_SHUTDOWN: &str = "57P01";

/// Classify a sqlx error for the store contract.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            match code.as_str() {
                UNIQUE_VIOLATION => StoreError::Conflict(db.message().to_string()),
                SERIALIZATION_FAILURE | DEADLOCK_DETECTED | ADMIN_SHUTDOWN => {
                    StoreError::Transient(db.message().to_string())
                }
                // Class 08: connection exception.
                c if c.starts_with("08") => StoreError::Transient(db.message().to_string()),
                _ => StoreError::Backend(err.to_string()),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Apply a child-collection patch inside the caller's transaction.
///
/// An upsert whose id belongs to another booklet matches no row and is
/// reported as a conflict.
async fn write_child(
    conn: &mut PgConnection,
    booklet_id: BookletId,
    patch: &SectionPatch,
) -> StoreResult<()> {
    let upserted = match patch {
        SectionPatch::Equipment(item) => Some(EquipmentRepo::upsert(conn, booklet_id, item).await),
        SectionPatch::Place(place) => Some(PlaceRepo::upsert(conn, booklet_id, place).await),
        SectionPatch::Faq(entry) => Some(FaqRepo::upsert(conn, booklet_id, entry).await),
        SectionPatch::GalleryItem(item) => Some(GalleryRepo::upsert(conn, booklet_id, item).await),
        SectionPatch::RemoveEquipment { id } => {
            EquipmentRepo::delete(conn, booklet_id, *id).await.map_err(map_sqlx_error)?;
            None
        }
        SectionPatch::RemovePlace { id } => {
            PlaceRepo::delete(conn, booklet_id, *id).await.map_err(map_sqlx_error)?;
            None
        }
        SectionPatch::RemoveFaq { id } => {
            FaqRepo::delete(conn, booklet_id, *id).await.map_err(map_sqlx_error)?;
            None
        }
        SectionPatch::RemoveGalleryItem { id } => {
            GalleryRepo::delete(conn, booklet_id, *id).await.map_err(map_sqlx_error)?;
            None
        }
        SectionPatch::GalleryOrder { ids } => {
            GalleryRepo::reorder(conn, booklet_id, ids).await.map_err(map_sqlx_error)?;
            None
        }
        // Singular sections are written by `BookletRepo::update_section`.
        _ => None,
    };

    match upserted.transpose().map_err(map_sqlx_error)? {
        Some(0) => Err(StoreError::Conflict(format!(
            "{} is already used by another booklet",
            patch.scope()
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct PgDraftStore {
    pool: DbPool,
}

impl PgDraftStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn hydrate(&self, row: BookletRow) -> StoreResult<Booklet> {
        let id = row.id;
        let children = BookletChildren {
            equipment: EquipmentRepo::list_for_booklet(&self.pool, id)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(Into::into)
                .collect(),
            places: PlaceRepo::list_for_booklet(&self.pool, id)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(Into::into)
                .collect(),
            faq: FaqRepo::list_for_booklet(&self.pool, id)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(Into::into)
                .collect(),
            gallery: GalleryRepo::list_for_booklet(&self.pool, id)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(Into::into)
                .collect(),
        };
        row.into_booklet(children)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn insert_booklet(&self, booklet: &Booklet) -> StoreResult<()> {
        BookletRepo::insert(&self.pool, booklet)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_booklet(&self, id: BookletId) -> StoreResult<Option<Booklet>> {
        match BookletRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_sqlx_error)?
        {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn list_booklets(&self, owner_id: DbId) -> StoreResult<Vec<Booklet>> {
        let rows = BookletRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(map_sqlx_error)?;
        let mut booklets = Vec::with_capacity(rows.len());
        for row in rows {
            booklets.push(self.hydrate(row).await?);
        }
        Ok(booklets)
    }

    async fn upsert_section(
        &self,
        booklet_id: BookletId,
        patch: &SectionPatch,
        wizard_step: u8,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let touched = BookletRepo::touch(&mut *tx, booklet_id, i16::from(wizard_step))
            .await
            .map_err(map_sqlx_error)?;
        if touched == 0 {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }

        let section = match patch {
            SectionPatch::Identity(s) => Some((SectionColumn::Identity, to_json(s)?)),
            SectionPatch::Practical(s) => Some((SectionColumn::Practical, to_json(s)?)),
            SectionPatch::Connectivity(s) => Some((SectionColumn::Connectivity, to_json(s)?)),
            SectionPatch::Cleaning(s) => Some((SectionColumn::Cleaning, to_json(s)?)),
            SectionPatch::Contacts(s) => Some((SectionColumn::Contacts, to_json(s)?)),
            SectionPatch::Legal(s) => Some((SectionColumn::Legal, to_json(s)?)),
            SectionPatch::Appearance(s) => Some((SectionColumn::Appearance, to_json(s)?)),
            _ => None,
        };
        match section {
            Some((column, value)) => {
                BookletRepo::update_section(&mut *tx, booklet_id, column, &value)
                    .await
                    .map_err(map_sqlx_error)?;
            }
            None => write_child(&mut *tx, booklet_id, patch).await?,
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        tracing::debug!(%booklet_id, scope = %patch.scope(), wizard_step, "Section upserted");
        Ok(())
    }

    async fn set_wizard_step(&self, booklet_id: BookletId, step: u8) -> StoreResult<()> {
        let updated = BookletRepo::set_wizard_step(&self.pool, booklet_id, i16::from(step))
            .await
            .map_err(map_sqlx_error)?;
        if updated == 0 {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        Ok(())
    }

    async fn set_status(&self, booklet_id: BookletId, status: BookletStatus) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        let updated = BookletRepo::set_status(&mut *conn, booklet_id, status.as_str())
            .await
            .map_err(map_sqlx_error)?;
        if updated == 0 {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        Ok(())
    }

    async fn delete_booklet(&self, booklet_id: BookletId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        if !BookletRepo::lock(&mut *tx, booklet_id)
            .await
            .map_err(map_sqlx_error)?
        {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        if PinRepo::has_active(&mut *tx, booklet_id)
            .await
            .map_err(map_sqlx_error)?
        {
            return Err(StoreError::Conflict(
                "booklet is referenced by an active access code".to_string(),
            ));
        }
        BookletRepo::delete(&mut *tx, booklet_id)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn active_pin(&self, booklet_id: BookletId) -> StoreResult<Option<Pin>> {
        PinRepo::find_active_for_booklet(&self.pool, booklet_id)
            .await
            .map_err(map_sqlx_error)?
            .map(Pin::try_from)
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn find_active_pin_by_code(&self, code: &str) -> StoreResult<Option<Pin>> {
        PinRepo::find_active_by_code(&self.pool, code)
            .await
            .map_err(map_sqlx_error)?
            .map(Pin::try_from)
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_pins(&self, booklet_id: BookletId) -> StoreResult<Vec<Pin>> {
        PinRepo::list_for_booklet(&self.pool, booklet_id)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Pin::try_from)
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn rotate_pin(
        &self,
        booklet_id: BookletId,
        code: &str,
        status: Option<BookletStatus>,
    ) -> StoreResult<Pin> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        if !BookletRepo::lock(&mut *tx, booklet_id)
            .await
            .map_err(map_sqlx_error)?
        {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }

        let revoked = PinRepo::revoke_active(&mut *tx, booklet_id)
            .await
            .map_err(map_sqlx_error)?;
        let row = PinRepo::insert(&mut *tx, &Pin::new_active(booklet_id, code.to_string()))
            .await
            .map_err(map_sqlx_error)?;
        if let Some(status) = status {
            BookletRepo::set_status(&mut *tx, booklet_id, status.as_str())
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(%booklet_id, revoked, "Access code rotated");
        Pin::try_from(row).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn health_check(&self) -> StoreResult<()> {
        health_check(&self.pool).await.map_err(map_sqlx_error)
    }
}
