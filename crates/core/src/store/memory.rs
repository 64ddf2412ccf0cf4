//! In-process [`DraftStore`] used by tests and local development.
//!
//! Besides the store semantics it records every section write and can be
//! told to fail the next N writes, which is how retry and notification
//! paths are exercised without a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{DraftStore, Pin, PinStatus, StoreError, StoreResult};
use crate::booklet::{Booklet, BookletStatus};
use crate::patch::SectionPatch;
use crate::types::{BookletId, DbId};

#[derive(Default)]
struct State {
    booklets: HashMap<BookletId, Booklet>,
    pins: Vec<Pin>,
}

/// A failure to inject into upcoming section writes.
struct InjectedFailure {
    remaining: usize,
    error: StoreError,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    writes: Mutex<Vec<(BookletId, SectionPatch)>>,
    write_attempts: AtomicUsize,
    failure: Mutex<Option<InjectedFailure>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` section writes fail with `error`.
    pub async fn fail_next_writes(&self, count: usize, error: StoreError) {
        *self.failure.lock().await = Some(InjectedFailure {
            remaining: count,
            error,
        });
    }

    /// Every successful section write, in order.
    pub async fn section_writes(&self) -> Vec<(BookletId, SectionPatch)> {
        self.writes.lock().await.clone()
    }

    /// Number of section writes attempted, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    async fn take_injected_failure(&self) -> Option<StoreError> {
        let mut failure = self.failure.lock().await;
        let injected = failure.as_mut()?;
        if injected.remaining == 0 {
            *failure = None;
            return None;
        }
        injected.remaining -= 1;
        Some(injected.error.clone())
    }
}

#[async_trait]
impl DraftStore for MemoryStore {
    async fn insert_booklet(&self, booklet: &Booklet) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.booklets.contains_key(&booklet.id) {
            return Err(StoreError::Conflict(format!(
                "booklet {} already exists",
                booklet.id
            )));
        }
        state.booklets.insert(booklet.id, booklet.clone());
        Ok(())
    }

    async fn find_booklet(&self, id: BookletId) -> StoreResult<Option<Booklet>> {
        Ok(self.state.read().await.booklets.get(&id).cloned())
    }

    async fn list_booklets(&self, owner_id: DbId) -> StoreResult<Vec<Booklet>> {
        let state = self.state.read().await;
        let mut owned: Vec<Booklet> = state
            .booklets
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn upsert_section(
        &self,
        booklet_id: BookletId,
        patch: &SectionPatch,
        wizard_step: u8,
    ) -> StoreResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_injected_failure().await {
            return Err(err);
        }

        let mut state = self.state.write().await;
        if !state.booklets.contains_key(&booklet_id) {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        if let Some(id) = upserted_child(patch) {
            let foreign = state
                .booklets
                .values()
                .any(|other| other.id != booklet_id && other.holds_child(id));
            if foreign {
                return Err(StoreError::Conflict(format!(
                    "{} is already used by another booklet",
                    patch.scope()
                )));
            }
        }
        let booklet = state
            .booklets
            .get_mut(&booklet_id)
            .ok_or_else(|| StoreError::not_found("Booklet", booklet_id))?;

        if let SectionPatch::Equipment(item) = patch {
            booklet
                .ensure_equipment_unique(item)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
        }

        booklet.apply(patch);
        booklet.wizard_step = wizard_step;
        drop(state);

        self.writes.lock().await.push((booklet_id, patch.clone()));
        Ok(())
    }

    async fn set_wizard_step(&self, booklet_id: BookletId, step: u8) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let booklet = state
            .booklets
            .get_mut(&booklet_id)
            .ok_or_else(|| StoreError::not_found("Booklet", booklet_id))?;
        booklet.wizard_step = step;
        booklet.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn set_status(&self, booklet_id: BookletId, status: BookletStatus) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let booklet = state
            .booklets
            .get_mut(&booklet_id)
            .ok_or_else(|| StoreError::not_found("Booklet", booklet_id))?;
        booklet.status = status;
        booklet.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn delete_booklet(&self, booklet_id: BookletId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let referenced = state
            .pins
            .iter()
            .any(|p| p.booklet_id == booklet_id && p.status == PinStatus::Active);
        if referenced {
            return Err(StoreError::Conflict(
                "booklet is referenced by an active access code".to_string(),
            ));
        }
        if state.booklets.remove(&booklet_id).is_none() {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        state.pins.retain(|p| p.booklet_id != booklet_id);
        Ok(())
    }

    async fn active_pin(&self, booklet_id: BookletId) -> StoreResult<Option<Pin>> {
        let state = self.state.read().await;
        Ok(state
            .pins
            .iter()
            .find(|p| p.booklet_id == booklet_id && p.status == PinStatus::Active)
            .cloned())
    }

    async fn find_active_pin_by_code(&self, code: &str) -> StoreResult<Option<Pin>> {
        let state = self.state.read().await;
        Ok(state
            .pins
            .iter()
            .find(|p| p.code == code && p.status == PinStatus::Active)
            .cloned())
    }

    async fn list_pins(&self, booklet_id: BookletId) -> StoreResult<Vec<Pin>> {
        let state = self.state.read().await;
        let mut pins: Vec<Pin> = state
            .pins
            .iter()
            .filter(|p| p.booklet_id == booklet_id)
            .cloned()
            .collect();
        pins.reverse();
        Ok(pins)
    }

    async fn rotate_pin(
        &self,
        booklet_id: BookletId,
        code: &str,
        status: Option<BookletStatus>,
    ) -> StoreResult<Pin> {
        let mut state = self.state.write().await;
        if !state.booklets.contains_key(&booklet_id) {
            return Err(StoreError::not_found("Booklet", booklet_id));
        }
        if state
            .pins
            .iter()
            .any(|p| p.code == code && p.status == PinStatus::Active)
        {
            return Err(StoreError::Conflict(format!("access code {code} is in use")));
        }

        let now = chrono::Utc::now();
        for pin in state
            .pins
            .iter_mut()
            .filter(|p| p.booklet_id == booklet_id && p.status == PinStatus::Active)
        {
            pin.status = PinStatus::Revoked;
            pin.revoked_at = Some(now);
        }

        let pin = Pin::new_active(booklet_id, code.to_string());
        state.pins.push(pin.clone());

        if let Some(status) = status {
            if let Some(booklet) = state.booklets.get_mut(&booklet_id) {
                booklet.status = status;
                booklet.updated_at = now;
            }
        }
        Ok(pin)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Id of the child entity `patch` inserts or replaces.
fn upserted_child(patch: &SectionPatch) -> Option<Uuid> {
    match patch {
        SectionPatch::Equipment(item) => Some(item.id),
        SectionPatch::Place(place) => Some(place.id),
        SectionPatch::Faq(entry) => Some(entry.id),
        SectionPatch::GalleryItem(item) => Some(item.id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booklet::EquipmentItem;
    use assert_matches::assert_matches;

    async fn seeded() -> (MemoryStore, Booklet) {
        let store = MemoryStore::new();
        let booklet = Booklet::new(42);
        store.insert_booklet(&booklet).await.unwrap();
        (store, booklet)
    }

    fn oven(id: Uuid, name: &str) -> SectionPatch {
        SectionPatch::Equipment(EquipmentItem {
            id,
            name: name.to_string(),
            category: "Kitchen".into(),
            steps: Vec::new(),
            manual_url: None,
        })
    }

    #[tokio::test]
    async fn upsert_records_step_and_is_idempotent() {
        let (store, booklet) = seeded().await;
        let patch = oven(Uuid::new_v4(), "Oven");
        store.upsert_section(booklet.id, &patch, 4).await.unwrap();
        store.upsert_section(booklet.id, &patch, 4).await.unwrap();

        let stored = store.find_booklet(booklet.id).await.unwrap().unwrap();
        assert_eq!(stored.equipment.len(), 1);
        assert_eq!(stored.wizard_step, 4);
    }

    #[tokio::test]
    async fn duplicate_equipment_pair_conflicts() {
        let (store, booklet) = seeded().await;
        store
            .upsert_section(booklet.id, &oven(Uuid::new_v4(), "Oven"), 4)
            .await
            .unwrap();
        let err = store
            .upsert_section(booklet.id, &oven(Uuid::new_v4(), "OVEN"), 4)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
    }

    #[tokio::test]
    async fn child_ids_stay_with_their_booklet() {
        let (store, booklet) = seeded().await;
        let other = Booklet::new(43);
        store.insert_booklet(&other).await.unwrap();
        let id = Uuid::new_v4();
        store.upsert_section(booklet.id, &oven(id, "Oven"), 4).await.unwrap();

        let err = store
            .upsert_section(other.id, &oven(id, "Kettle"), 4)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
        let untouched = store.find_booklet(booklet.id).await.unwrap().unwrap();
        assert_eq!(untouched.equipment[0].name, "Oven");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (store, booklet) = seeded().await;
        store
            .fail_next_writes(2, StoreError::Transient("down".into()))
            .await;
        let patch = oven(Uuid::new_v4(), "Oven");
        assert!(store.upsert_section(booklet.id, &patch, 1).await.is_err());
        assert!(store.upsert_section(booklet.id, &patch, 1).await.is_err());
        assert!(store.upsert_section(booklet.id, &patch, 1).await.is_ok());
        assert_eq!(store.write_attempts(), 3);
        assert_eq!(store.section_writes().await.len(), 1);
    }

    #[tokio::test]
    async fn rotate_pin_keeps_exactly_one_active() {
        let (store, booklet) = seeded().await;
        let first = store
            .rotate_pin(booklet.id, "AAAAAA", Some(BookletStatus::Published))
            .await
            .unwrap();
        let second = store.rotate_pin(booklet.id, "BBBBBB", None).await.unwrap();

        let pins = store.list_pins(booklet.id).await.unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(
            pins.iter().filter(|p| p.status == PinStatus::Active).count(),
            1
        );
        assert_eq!(store.active_pin(booklet.id).await.unwrap().unwrap().id, second.id);
        assert!(store.find_active_pin_by_code(&first.code).await.unwrap().is_none());
        assert_eq!(
            store.find_booklet(booklet.id).await.unwrap().unwrap().status,
            BookletStatus::Published
        );
    }

    #[tokio::test]
    async fn rotate_pin_rejects_code_in_use() {
        let (store, a) = seeded().await;
        let b = Booklet::new(42);
        store.insert_booklet(&b).await.unwrap();
        store.rotate_pin(a.id, "ABC234", None).await.unwrap();
        assert_matches!(
            store.rotate_pin(b.id, "ABC234", None).await,
            Err(StoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn delete_is_blocked_by_active_pin() {
        let (store, booklet) = seeded().await;
        store.rotate_pin(booklet.id, "ZZZZZZ", None).await.unwrap();
        assert_matches!(
            store.delete_booklet(booklet.id).await,
            Err(StoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn list_is_filtered_by_owner() {
        let (store, _) = seeded().await;
        store.insert_booklet(&Booklet::new(7)).await.unwrap();
        assert_eq!(store.list_booklets(42).await.unwrap().len(), 1);
        assert_eq!(store.list_booklets(7).await.unwrap().len(), 1);
        assert!(store.list_booklets(99).await.unwrap().is_empty());
    }
}
