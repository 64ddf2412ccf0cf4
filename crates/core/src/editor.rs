//! The wizard controller: one operator editing one booklet.
//!
//! An [`EditorSession`] keeps the operator's local copy of the booklet,
//! which is the source of truth while the session is open. Edits are
//! validated, applied locally at once, then handed to the
//! [`AutosaveEngine`]. A failed flush is reported but never rolls the local
//! copy back.
//!
//! Navigation flushes the outgoing step before the new step pointer is
//! persisted, so the stored pointer never runs ahead of unsaved content.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use validator::Validate;

use crate::autosave::{AutosaveConfig, AutosaveEngine, AutosaveNotice, FlushReport};
use crate::booklet::{Booklet, BookletStatus};
use crate::error::CoreError;
use crate::patch::{Scope, SectionPatch};
use crate::publication::PublicationProtocol;
use crate::retry::retry_transient;
use crate::store::{load_owned, DraftStore, Pin};
use crate::types::{BookletId, DbId};
use crate::wizard::{can_publish_from, WizardStep};

static ACCENT_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));

/// Outcome of a navigation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Navigation {
    pub step: WizardStep,
    /// Whether the new pointer reached the store.
    pub persisted: bool,
    pub flush: FlushReport,
}

pub struct EditorSession {
    booklet_id: BookletId,
    owner_id: DbId,
    store: Arc<dyn DraftStore>,
    config: AutosaveConfig,
    local: RwLock<Booklet>,
    step: Mutex<WizardStep>,
    autosave: AutosaveEngine,
    opened_at: Instant,
    /// Milliseconds after `opened_at` of the last operator request.
    last_active_ms: AtomicU64,
}

impl fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("booklet_id", &self.booklet_id)
            .field("owner_id", &self.owner_id)
            .field("step", &self.step.try_lock().map(|step| *step).ok())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Create a new draft on step 1 and open a session on it.
    pub async fn start(
        store: Arc<dyn DraftStore>,
        owner_id: DbId,
        config: AutosaveConfig,
    ) -> Result<Self, CoreError> {
        let booklet = Booklet::new(owner_id);
        store.insert_booklet(&booklet).await?;
        tracing::info!(booklet_id = %booklet.id, owner_id, "Draft booklet created");
        Ok(Self::from_booklet(store, booklet, config))
    }

    /// Resume editing an existing booklet at its stored step.
    pub async fn open(
        store: Arc<dyn DraftStore>,
        booklet_id: BookletId,
        owner_id: DbId,
        config: AutosaveConfig,
    ) -> Result<Self, CoreError> {
        let booklet = load_owned(store.as_ref(), booklet_id, owner_id).await?;
        tracing::debug!(%booklet_id, step = booklet.wizard_step, "Editor session opened");
        Ok(Self::from_booklet(store, booklet, config))
    }

    fn from_booklet(store: Arc<dyn DraftStore>, booklet: Booklet, config: AutosaveConfig) -> Self {
        let step = WizardStep::from_number(booklet.wizard_step).unwrap_or(WizardStep::Identity);
        let autosave = AutosaveEngine::new(booklet.id, Arc::clone(&store), config.clone(), step);
        Self {
            booklet_id: booklet.id,
            owner_id: booklet.owner_id,
            store,
            config,
            local: RwLock::new(booklet),
            step: Mutex::new(step),
            autosave,
            opened_at: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        }
    }

    pub fn booklet_id(&self) -> BookletId {
        self.booklet_id
    }

    pub fn owner_id(&self) -> DbId {
        self.owner_id
    }

    /// Record operator activity, deferring an idle close.
    pub fn touch(&self) {
        let elapsed = self.opened_at.elapsed().as_millis() as u64;
        self.last_active_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last [`touch`](Self::touch) or since opening.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.opened_at.elapsed().saturating_sub(last)
    }

    /// The operator's local copy, pending edits included.
    pub async fn snapshot(&self) -> Booklet {
        self.local.read().await.clone()
    }

    pub async fn current_step(&self) -> WizardStep {
        *self.step.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutosaveNotice> {
        self.autosave.subscribe()
    }

    pub async fn pending_scopes(&self) -> Vec<Scope> {
        self.autosave.pending_scopes().await
    }

    // -- editing ------------------------------------------------------------

    /// Validate, apply locally, and schedule the write.
    pub async fn edit(&self, patch: SectionPatch) -> Result<Scope, CoreError> {
        if self.is_closed() {
            return Err(CoreError::Validation(
                "Editing session is closed".to_string(),
            ));
        }
        self.touch();
        let patch = patch.normalized();
        {
            let mut local = self.local.write().await;
            validate_patch(&local, &patch)?;
            local.apply(&patch);
        }
        self.autosave.schedule(patch).await
    }

    // -- navigation ---------------------------------------------------------

    /// Move to `target`, flushing the outgoing step first.
    pub async fn go_to(&self, target: WizardStep) -> Result<Navigation, CoreError> {
        self.touch();
        let mut step = self.step.lock().await;
        let outgoing = *step;
        let flush = self.autosave.flush_step(outgoing).await;
        *step = target;

        if !flush.is_clean() {
            tracing::warn!(
                booklet_id = %self.booklet_id,
                from = outgoing.to_number(),
                to = target.to_number(),
                failed = flush.failed.len(),
                "Outgoing step not saved, keeping stored pointer"
            );
            return Ok(Navigation {
                step: target,
                persisted: false,
                flush,
            });
        }

        let number = target.to_number();
        let persisted = retry_transient(&self.config.retry, || {
            self.store.set_wizard_step(self.booklet_id, number)
        })
        .await;

        let persisted = match persisted {
            Ok(_) => {
                self.autosave.set_step(target);
                self.local.write().await.wizard_step = number;
                tracing::debug!(booklet_id = %self.booklet_id, step = number, "Wizard step persisted");
                true
            }
            Err(exhausted) => {
                tracing::warn!(
                    booklet_id = %self.booklet_id,
                    step = number,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "Failed to persist wizard step"
                );
                false
            }
        };

        Ok(Navigation {
            step: target,
            persisted,
            flush,
        })
    }

    pub async fn go_to_number(&self, step: u8) -> Result<Navigation, CoreError> {
        self.go_to(WizardStep::from_number(step)?).await
    }

    pub async fn next(&self) -> Result<Navigation, CoreError> {
        let current = self.current_step().await;
        let target = current
            .next()
            .ok_or_else(|| CoreError::Validation("Already on the last step".to_string()))?;
        self.go_to(target).await
    }

    pub async fn back(&self) -> Result<Navigation, CoreError> {
        let current = self.current_step().await;
        let target = current
            .previous()
            .ok_or_else(|| CoreError::Validation("Already on the first step".to_string()))?;
        self.go_to(target).await
    }

    // -- lifecycle ----------------------------------------------------------

    pub async fn flush_all(&self) -> FlushReport {
        self.autosave.flush_all().await
    }

    /// Publish from the terminal step once every pending edit is saved.
    pub async fn publish(&self, protocol: &PublicationProtocol) -> Result<Pin, CoreError> {
        can_publish_from(self.current_step().await)?;

        let flush = self.autosave.flush_all().await;
        if !flush.is_clean() {
            return Err(CoreError::Transient(format!(
                "{} pending change(s) could not be saved",
                flush.failed.len()
            )));
        }

        let pin = protocol.publish(self.booklet_id, self.owner_id).await?;
        self.local.write().await.status = BookletStatus::Published;
        Ok(pin)
    }

    /// Flush everything still pending and refuse further edits.
    pub async fn close(&self) -> FlushReport {
        self.autosave.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.autosave.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Local validation
// ---------------------------------------------------------------------------

fn invalid(err: validator::ValidationErrors) -> CoreError {
    CoreError::Validation(err.to_string())
}

fn require_text(value: &str, what: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_known<T>(
    items: &[T],
    id: uuid::Uuid,
    entity: &'static str,
    key: impl Fn(&T) -> uuid::Uuid,
) -> Result<(), CoreError> {
    if items.iter().any(|item| key(item) == id) {
        Ok(())
    } else {
        Err(CoreError::not_found(entity, id))
    }
}

/// Check `patch` against the operator's local copy.
pub fn validate_patch(booklet: &Booklet, patch: &SectionPatch) -> Result<(), CoreError> {
    match patch {
        SectionPatch::Identity(section) => section.validate().map_err(invalid),
        SectionPatch::Contacts(section) => section.validate().map_err(invalid),
        SectionPatch::Equipment(item) => {
            item.validate().map_err(invalid)?;
            booklet.ensure_equipment_unique(item)
        }
        SectionPatch::Place(place) => require_text(&place.name, "Place name"),
        SectionPatch::Faq(entry) => require_text(&entry.question, "FAQ question"),
        SectionPatch::Appearance(appearance) => {
            require_text(&appearance.theme, "Theme")?;
            match appearance.accent_color.as_deref() {
                Some(color) if !ACCENT_COLOR_RE.is_match(color) => Err(CoreError::Validation(
                    format!("Accent color '{color}' must look like #RRGGBB"),
                )),
                _ => Ok(()),
            }
        }
        SectionPatch::GalleryItem(item) => item.validate().map_err(invalid),
        SectionPatch::GalleryOrder { ids } => {
            let unique: HashSet<_> = ids.iter().collect();
            let existing: HashSet<_> = booklet.gallery.iter().map(|g| &g.id).collect();
            if unique.len() != ids.len() || unique != existing {
                return Err(CoreError::Validation(
                    "Gallery order must list every gallery item exactly once".to_string(),
                ));
            }
            Ok(())
        }
        SectionPatch::RemoveEquipment { id } => {
            require_known(&booklet.equipment, *id, "EquipmentItem", |i| i.id)
        }
        SectionPatch::RemovePlace { id } => require_known(&booklet.places, *id, "Place", |p| p.id),
        SectionPatch::RemoveFaq { id } => require_known(&booklet.faq, *id, "FaqEntry", |f| f.id),
        SectionPatch::RemoveGalleryItem { id } => {
            require_known(&booklet.gallery, *id, "GalleryItem", |g| g.id)
        }
        SectionPatch::Practical(_)
        | SectionPatch::Connectivity(_)
        | SectionPatch::Cleaning(_)
        | SectionPatch::Legal(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booklet::{Appearance, EquipmentItem, GalleryItem, IdentitySection};
    use crate::steps::Step;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreError;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use uuid::Uuid;

    const OWNER: DbId = 11;

    async fn session() -> (Arc<MemoryStore>, EditorSession) {
        let store = Arc::new(MemoryStore::new());
        let session = EditorSession::start(store.clone(), OWNER, AutosaveConfig::default())
            .await
            .unwrap();
        (store, session)
    }

    fn oven(id: Uuid, steps: Vec<Step>) -> SectionPatch {
        SectionPatch::Equipment(EquipmentItem {
            id,
            name: "Oven".into(),
            category: "Kitchen".into(),
            steps,
            manual_url: None,
        })
    }

    fn gallery_item(url: &str) -> SectionPatch {
        SectionPatch::GalleryItem(GalleryItem {
            id: Uuid::new_v4(),
            url: url.into(),
            alt: None,
            caption: None,
            order: 0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn start_creates_a_draft_on_step_one() {
        let (store, session) = session().await;
        let stored = store
            .find_booklet(session.booklet_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BookletStatus::Draft);
        assert_eq!(stored.wizard_step, 1);
        assert_eq!(session.current_step().await, WizardStep::Identity);
    }

    #[tokio::test(start_paused = true)]
    async fn oven_scenario_normalizes_free_text_steps() {
        let (store, session) = session().await;
        let item: EquipmentItem = serde_json::from_value(serde_json::json!({
            "name": "Oven",
            "category": "Kitchen",
            "steps": "Turn on\nSet to 180\n"
        }))
        .unwrap();
        session.edit(SectionPatch::Equipment(item)).await.unwrap();
        session.flush_all().await;

        let stored = store
            .find_booklet(session.booklet_id())
            .await
            .unwrap()
            .unwrap();
        let texts: Vec<&str> = stored.equipment[0]
            .steps
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, ["Turn on", "Set to 180"]);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_apply_locally_before_the_flush() {
        let (store, session) = session().await;
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(session.snapshot().await.identity.property_name, "Villa");
        assert!(store.section_writes().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_keeps_local_state() {
        let (store, session) = session().await;
        store
            .fail_next_writes(3, StoreError::Transient("down".into()))
            .await;
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(session.snapshot().await.identity.property_name, "Villa");
        assert_eq!(session.pending_scopes().await, vec![Scope::Identity]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_equipment_is_rejected_locally() {
        let (_, session) = session().await;
        session.edit(oven(Uuid::new_v4(), vec![])).await.unwrap();
        let err = session.edit(oven(Uuid::new_v4(), vec![])).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
        assert_eq!(session.snapshot().await.equipment.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_flushes_outgoing_step_then_persists_pointer() {
        let (store, session) = session().await;
        session.go_to(WizardStep::Equipment).await.unwrap();
        session
            .edit(oven(Uuid::new_v4(), vec![Step::new("Turn on")]))
            .await
            .unwrap();

        let nav = session.next().await.unwrap();
        assert!(nav.persisted);
        assert_eq!(nav.step, WizardStep::Cleaning);
        assert_eq!(nav.flush.saved.len(), 1);

        let stored = store
            .find_booklet(session.booklet_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.equipment.len(), 1);
        assert_eq!(stored.wizard_step, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_is_not_persisted_past_unsaved_content() {
        let (store, session) = session().await;
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        store
            .fail_next_writes(3, StoreError::Transient("down".into()))
            .await;

        let nav = session.next().await.unwrap();
        assert!(!nav.persisted);
        assert_eq!(nav.flush.failed.len(), 1);
        assert_eq!(session.current_step().await, WizardStep::PracticalInfo);

        let stored = store
            .find_booklet(session.booklet_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.wizard_step, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_waits_for_a_write_still_retrying() {
        let (store, session) = session().await;
        store
            .fail_next_writes(3, StoreError::Transient("down".into()))
            .await;
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        // Past the debounce: the timer's first attempt has failed.
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let nav = session.next().await.unwrap();
        assert!(nav.persisted);
        assert_eq!(nav.flush.saved, vec![Scope::Identity]);

        let stored = store
            .find_booklet(session.booklet_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.identity.property_name, "Villa");
        assert_eq!(stored.wizard_step, 2);
        assert!(session.pending_scopes().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_resets_on_activity() {
        let (_, session) = session().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.idle_for(), Duration::from_secs(30));

        session.touch();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.idle_for(), Duration::from_secs(5));
    }

    #[test]
    fn debug_output_names_the_booklet() {
        let store: Arc<dyn DraftStore> = Arc::new(MemoryStore::new());
        let booklet = Booklet::new(OWNER);
        let session = EditorSession::from_booklet(store, booklet.clone(), AutosaveConfig::default());
        let rendered = format!("{session:?}");
        assert!(rendered.contains(&booklet.id.to_string()));
        assert!(rendered.contains("Identity"));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_stops_at_the_edges() {
        let (_, session) = session().await;
        assert_matches!(session.back().await, Err(CoreError::Validation(_)));
        session.go_to(WizardStep::Appearance).await.unwrap();
        assert_matches!(session.next().await, Err(CoreError::Validation(_)));
        assert_matches!(session.go_to_number(11).await, Err(CoreError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_resumes_at_stored_step() {
        let (store, session) = session().await;
        session.go_to(WizardStep::Faq).await.unwrap();
        session.close().await;

        let reopened = EditorSession::open(
            store.clone(),
            session.booklet_id(),
            OWNER,
            AutosaveConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(reopened.current_step().await, WizardStep::Faq);

        let foreign =
            EditorSession::open(store, session.booklet_id(), OWNER + 1, AutosaveConfig::default())
                .await;
        assert_matches!(foreign, Err(CoreError::Forbidden(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn gallery_reorder_must_be_a_permutation() {
        let (_, session) = session().await;
        session.edit(gallery_item("/media/a.png")).await.unwrap();
        session.edit(gallery_item("/media/b.png")).await.unwrap();
        let ids: Vec<Uuid> = session.snapshot().await.gallery.iter().map(|g| g.id).collect();

        let partial = SectionPatch::GalleryOrder { ids: vec![ids[0]] };
        assert_matches!(session.edit(partial).await, Err(CoreError::Validation(_)));

        let reversed = SectionPatch::GalleryOrder {
            ids: vec![ids[1], ids[0]],
        };
        session.edit(reversed).await.unwrap();
        let gallery = session.snapshot().await.gallery;
        let first = gallery.iter().find(|g| g.order == 0).unwrap();
        assert_eq!(first.id, ids[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn accent_color_is_validated() {
        let (_, session) = session().await;
        let bad = SectionPatch::Appearance(Appearance {
            theme: "classic".into(),
            accent_color: Some("red".into()),
        });
        assert_matches!(session.edit(bad).await, Err(CoreError::Validation(_)));

        let good = SectionPatch::Appearance(Appearance {
            theme: "classic".into(),
            accent_color: Some("#A1b2C3".into()),
        });
        assert!(session.edit(good).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn removing_an_unknown_item_is_not_found() {
        let (_, session) = session().await;
        let removal = SectionPatch::RemoveFaq { id: Uuid::new_v4() };
        assert_matches!(session.edit(removal).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_requires_terminal_step_and_flushes_first() {
        let (store, session) = session().await;
        let protocol = PublicationProtocol::new(store.clone(), 6).unwrap();
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_matches!(session.publish(&protocol).await, Err(CoreError::Validation(_)));

        session.go_to(WizardStep::Appearance).await.unwrap();
        let pin = session.publish(&protocol).await.unwrap();
        assert_eq!(pin.code.len(), 6);
        assert_eq!(session.snapshot().await.status, BookletStatus::Published);
        assert!(protocol.guest_view(&pin.code).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_and_refuses_further_edits() {
        let (store, session) = session().await;
        session
            .edit(SectionPatch::Identity(IdentitySection {
                property_name: "Villa".into(),
                ..Default::default()
            }))
            .await
            .unwrap();

        let report = session.close().await;
        assert!(report.is_clean());
        assert_eq!(store.section_writes().await.len(), 1);
        assert!(session.is_closed());
        assert!(session
            .edit(SectionPatch::Identity(IdentitySection::default()))
            .await
            .is_err());
    }
}
