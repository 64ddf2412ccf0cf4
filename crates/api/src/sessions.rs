//! Open editor sessions, one per booklet.
//!
//! A session owns the booklet's debounce timers, so it must outlive the
//! request that created it. The manager keeps sessions until they are
//! closed explicitly, sit idle past the configured TTL, or the server shuts
//! down. Failed-save notices are forwarded to the event bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hostbook_core::autosave::{AutosaveConfig, AutosaveNotice, FlushReport};
use hostbook_core::editor::EditorSession;
use hostbook_core::error::CoreError;
use hostbook_core::store::DraftStore;
use hostbook_core::types::{BookletId, DbId};
use hostbook_events::{event_types, BookletEvent, EventBus};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

pub struct SessionManager {
    store: Arc<dyn DraftStore>,
    config: AutosaveConfig,
    event_bus: Arc<EventBus>,
    sessions: RwLock<HashMap<BookletId, Arc<EditorSession>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DraftStore>, config: AutosaveConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            config,
            event_bus,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a draft booklet and open a session on it.
    pub async fn start(&self, owner_id: DbId) -> Result<Arc<EditorSession>, CoreError> {
        let session = Arc::new(
            EditorSession::start(Arc::clone(&self.store), owner_id, self.config.clone()).await?,
        );
        self.forward_notices(&session);
        self.sessions
            .write()
            .await
            .insert(session.booklet_id(), Arc::clone(&session));
        Ok(session)
    }

    /// The open session for `booklet_id`, opening one if needed.
    pub async fn open(
        &self,
        booklet_id: BookletId,
        owner_id: DbId,
    ) -> Result<Arc<EditorSession>, CoreError> {
        if let Some(session) = self.sessions.read().await.get(&booklet_id) {
            let session = owned(session, owner_id)?;
            session.touch();
            return Ok(session);
        }

        let opened = Arc::new(
            EditorSession::open(
                Arc::clone(&self.store),
                booklet_id,
                owner_id,
                self.config.clone(),
            )
            .await?,
        );

        let mut sessions = self.sessions.write().await;
        // Another request may have opened it meanwhile; keep theirs.
        let session = sessions.entry(booklet_id).or_insert_with(|| {
            self.forward_notices(&opened);
            Arc::clone(&opened)
        });
        owned(session, owner_id)
    }

    pub async fn get(&self, booklet_id: BookletId) -> Option<Arc<EditorSession>> {
        self.sessions.read().await.get(&booklet_id).cloned()
    }

    /// Flush and drop the session for `booklet_id`. Returns `None` when no
    /// session was open.
    pub async fn close(
        &self,
        booklet_id: BookletId,
        owner_id: DbId,
    ) -> Result<Option<FlushReport>, CoreError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&booklet_id) {
                Some(session) if session.owner_id() != owner_id => {
                    return Err(CoreError::Forbidden("Access denied".to_string()));
                }
                Some(_) => sessions.remove(&booklet_id),
                None => None,
            }
        };

        match session {
            Some(session) => {
                let report = session.close().await;
                tracing::info!(
                    %booklet_id,
                    saved = report.saved.len(),
                    failed = report.failed.len(),
                    "Editor session closed"
                );
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    /// Close every session, flushing pending edits. Returns how many
    /// sessions still had unsaved scopes afterwards.
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        let mut unclean = 0;
        for session in sessions {
            let report = session.close().await;
            if !report.is_clean() {
                unclean += 1;
                tracing::warn!(
                    booklet_id = %session.booklet_id(),
                    failed = report.failed.len(),
                    "Session closed with unsaved changes"
                );
            }
        }
        unclean
    }

    /// Close sessions nobody has touched for `ttl`. Their pending edits are
    /// flushed. Returns how many sessions were closed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let idle: Vec<_> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<_> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() >= ttl)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| sessions.remove(&id)).collect()
        };

        for session in &idle {
            let report = session.close().await;
            if report.is_clean() {
                tracing::info!(booklet_id = %session.booklet_id(), "Idle editor session closed");
            } else {
                tracing::warn!(
                    booklet_id = %session.booklet_id(),
                    failed = report.failed.len(),
                    "Idle editor session closed with unsaved changes"
                );
            }
        }
        idle.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Republish failed-save notices as `booklet.autosave_failed` events.
    /// The task ends when the session's notice channel closes.
    fn forward_notices(&self, session: &EditorSession) {
        let mut notices = session.subscribe();
        let event_bus = Arc::clone(&self.event_bus);
        let owner_id = session.owner_id();

        tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(AutosaveNotice::Failed {
                        booklet_id,
                        scope,
                        attempts,
                        error,
                    }) => {
                        event_bus.publish(
                            BookletEvent::new(event_types::BOOKLET_AUTOSAVE_FAILED)
                                .with_booklet(booklet_id)
                                .with_actor(owner_id)
                                .with_payload(serde_json::json!({
                                    "scope": scope.to_string(),
                                    "attempts": attempts,
                                    "error": error,
                                })),
                        );
                    }
                    Ok(AutosaveNotice::Saved { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Autosave notice forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Sweep idle sessions every `interval` until `cancel` fires.
pub async fn run_idle_sweep(
    sessions: Arc<SessionManager>,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Idle session sweep stopped");
                break;
            }
            _ = ticker.tick() => {
                let closed = sessions.sweep_idle(ttl).await;
                if closed > 0 {
                    tracing::debug!(closed, "Idle session sweep");
                }
            }
        }
    }
}

fn owned(session: &Arc<EditorSession>, owner_id: DbId) -> Result<Arc<EditorSession>, CoreError> {
    if session.owner_id() != owner_id {
        return Err(CoreError::Forbidden("Access denied".to_string()));
    }
    Ok(Arc::clone(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use hostbook_core::booklet::IdentitySection;
    use hostbook_core::patch::SectionPatch;
    use hostbook_core::store::memory::MemoryStore;
    use hostbook_core::store::StoreError;

    fn manager(store: Arc<MemoryStore>) -> (SessionManager, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        let mut config = AutosaveConfig::default();
        config.retry.max_attempts = 1;
        (
            SessionManager::new(store, config, Arc::clone(&bus)),
            bus,
        )
    }

    fn identity(name: &str) -> SectionPatch {
        SectionPatch::Identity(IdentitySection {
            property_name: name.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn open_reuses_the_live_session() {
        let (sessions, _bus) = manager(Arc::new(MemoryStore::new()));
        let started = sessions.start(7).await.unwrap();

        let opened = sessions.open(started.booklet_id(), 7).await.unwrap();
        assert!(Arc::ptr_eq(&started, &opened));
        assert_eq!(sessions.count().await, 1);
    }

    #[tokio::test]
    async fn other_owners_are_refused() {
        let (sessions, _bus) = manager(Arc::new(MemoryStore::new()));
        let started = sessions.start(7).await.unwrap();

        assert_matches!(
            sessions.open(started.booklet_id(), 8).await,
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            sessions.close(started.booklet_id(), 8).await,
            Err(CoreError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn close_flushes_and_forgets() {
        let store = Arc::new(MemoryStore::new());
        let (sessions, _bus) = manager(Arc::clone(&store));
        let session = sessions.start(7).await.unwrap();
        session.edit(identity("Sea View")).await.unwrap();

        let report = sessions.close(session.booklet_id(), 7).await.unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(store.section_writes().await.len(), 1);
        assert!(sessions.get(session.booklet_id()).await.is_none());
        assert!(sessions.close(session.booklet_id(), 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_saves_become_events() {
        let store = Arc::new(MemoryStore::new());
        let (sessions, bus) = manager(Arc::clone(&store));
        let mut events = bus.subscribe();
        let session = sessions.start(7).await.unwrap();

        store
            .fail_next_writes(1, StoreError::Transient("down".into()))
            .await;
        session.edit(identity("Sea View")).await.unwrap();
        assert!(!session.flush_all().await.is_clean());

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .expect("event should arrive")
            .unwrap();
        assert_eq!(event.event_type, event_types::BOOKLET_AUTOSAVE_FAILED);
        assert_eq!(event.booklet_id, Some(session.booklet_id()));
        assert_eq!(event.payload["scope"], "identity");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept_and_flushed() {
        let store = Arc::new(MemoryStore::new());
        let (sessions, _bus) = manager(Arc::clone(&store));
        let idle = sessions.start(1).await.unwrap();
        let busy = sessions.start(2).await.unwrap();
        idle.edit(identity("Forgotten Tab")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(50)).await;
        sessions.open(busy.booklet_id(), 2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(sessions.sweep_idle(Duration::from_secs(60)).await, 1);
        assert!(idle.is_closed());
        assert!(sessions.get(idle.booklet_id()).await.is_none());
        assert!(sessions.get(busy.booklet_id()).await.is_some());

        let stored = store.find_booklet(idle.booklet_id()).await.unwrap().unwrap();
        assert_eq!(stored.identity.property_name, "Forgotten Tab");
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_task_stops_on_cancel() {
        let (sessions, _bus) = manager(Arc::new(MemoryStore::new()));
        let sessions = Arc::new(sessions);
        sessions.start(1).await.unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_idle_sweep(
            Arc::clone(&sessions),
            Duration::from_secs(60),
            Duration::from_secs(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(sessions.count().await, 0);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn close_all_drains_every_session() {
        let (sessions, _bus) = manager(Arc::new(MemoryStore::new()));
        sessions.start(1).await.unwrap();
        sessions.start(2).await.unwrap();

        assert_eq!(sessions.close_all().await, 0);
        assert_eq!(sessions.count().await, 0);
    }
}
