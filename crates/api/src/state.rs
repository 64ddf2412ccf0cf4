use std::sync::Arc;

use hostbook_core::assistant::TextCompleter;
use hostbook_core::error::CoreError;
use hostbook_core::publication::PublicationProtocol;
use hostbook_core::store::DraftStore;
use hostbook_events::EventBus;

use crate::config::ServerConfig;
use crate::media::MediaStore;
use crate::sessions::SessionManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL-backed in production, in-memory without `DATABASE_URL`.
    pub store: Arc<dyn DraftStore>,
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionManager>,
    pub publication: PublicationProtocol,
    pub event_bus: Arc<EventBus>,
    pub media: Arc<dyn MediaStore>,
    /// Text generation for the guest assistant, when one is configured.
    pub assistant: Option<Arc<dyn TextCompleter>>,
}

impl AppState {
    /// Wire the session manager and publication protocol around `store`.
    pub fn new(
        store: Arc<dyn DraftStore>,
        config: ServerConfig,
        event_bus: Arc<EventBus>,
        media: Arc<dyn MediaStore>,
    ) -> Result<Self, CoreError> {
        let publication = PublicationProtocol::new(Arc::clone(&store), config.pin_length)?;
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store),
            config.autosave.clone(),
            Arc::clone(&event_bus),
        ));
        Ok(Self {
            store,
            config: Arc::new(config),
            sessions,
            publication,
            event_bus,
            media,
            assistant: None,
        })
    }

    pub fn with_assistant(mut self, completer: Arc<dyn TextCompleter>) -> Self {
        self.assistant = Some(completer);
        self
    }
}
