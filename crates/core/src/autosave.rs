//! Debounced, scope-keyed autosave.
//!
//! An [`AutosaveEngine`] belongs to one editing session of one booklet.
//! Each [`Scope`] has its own debounce timer: a newer patch for a scope
//! replaces the pending one and restarts the timer, while other scopes are
//! unaffected. When a timer fires, the scope's latest patch is upserted
//! with bounded retries. Writes of the same scope are serialized so an
//! older retry can never land after a newer write.
//!
//! Flushes wait for writes already in flight, so once a flush returns no
//! selected scope is still being written in the background. The engine is
//! a scoped resource: [`AutosaveEngine::close`] flushes everything still
//! pending. A write that fails for good stays pending, is
//! reported through [`AutosaveNotice::Failed`], and is attempted again by
//! the next flush.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::CoreError;
use crate::patch::{Scope, SectionPatch};
use crate::retry::{retry_transient, Exhausted, RetryPolicy};
use crate::store::DraftStore;
use crate::types::BookletId;
use crate::wizard::WizardStep;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default quiet interval for prose scopes.
pub const DEFAULT_PROSE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Default quiet interval for structured list scopes.
pub const DEFAULT_LIST_DEBOUNCE: Duration = Duration::from_millis(500);

const NOTICE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    pub prose_debounce: Duration,
    pub list_debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            prose_debounce: DEFAULT_PROSE_DEBOUNCE,
            list_debounce: DEFAULT_LIST_DEBOUNCE,
            retry: RetryPolicy::default(),
        }
    }
}

impl AutosaveConfig {
    pub fn debounce_for(&self, scope: Scope) -> Duration {
        if scope.is_list() {
            self.list_debounce
        } else {
            self.prose_debounce
        }
    }
}

// ---------------------------------------------------------------------------
// Notices and reports
// ---------------------------------------------------------------------------

/// Non-blocking outcome of a flush, broadcast to whoever listens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutosaveNotice {
    Saved {
        booklet_id: BookletId,
        scope: Scope,
        attempts: u32,
    },
    Failed {
        booklet_id: BookletId,
        scope: Scope,
        attempts: u32,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedScope {
    pub scope: Scope,
    pub error: String,
}

/// Result of an explicit flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    pub saved: Vec<Scope>,
    pub failed: Vec<FailedScope>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct Pending {
    patch: SectionPatch,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    booklet_id: BookletId,
    store: Arc<dyn DraftStore>,
    config: AutosaveConfig,
    step: AtomicU8,
    generation: AtomicU64,
    pending: Mutex<HashMap<Scope, Pending>>,
    scope_locks: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
    notices: broadcast::Sender<AutosaveNotice>,
    closed: AtomicBool,
}

pub struct AutosaveEngine {
    inner: Arc<Inner>,
}

impl AutosaveEngine {
    pub fn new(
        booklet_id: BookletId,
        store: Arc<dyn DraftStore>,
        config: AutosaveConfig,
        step: WizardStep,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                booklet_id,
                store,
                config,
                step: AtomicU8::new(step.to_number()),
                generation: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
                scope_locks: Mutex::new(HashMap::new()),
                notices,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn booklet_id(&self) -> BookletId {
        self.inner.booklet_id
    }

    /// Step recorded alongside every successful flush.
    pub fn current_step(&self) -> WizardStep {
        WizardStep::from_number(self.inner.step.load(Ordering::SeqCst))
            .unwrap_or(WizardStep::Identity)
    }

    pub fn set_step(&self, step: WizardStep) {
        self.inner.step.store(step.to_number(), Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutosaveNotice> {
        self.inner.notices.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Queue `patch` under its scope, replacing any pending patch for the
    /// same scope and restarting that scope's timer.
    pub async fn schedule(&self, patch: SectionPatch) -> Result<Scope, CoreError> {
        if self.is_closed() {
            return Err(CoreError::Validation(
                "Editing session is closed".to_string(),
            ));
        }

        let patch = patch.normalized();
        let scope = patch.scope();
        let delay = self.inner.config.debounce_for(scope);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);

        let mut pending = self.inner.pending.lock().await;
        if let Some(previous) = pending.remove(&scope) {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
            tracing::trace!(booklet_id = %self.inner.booklet_id, %scope, "Superseded pending patch");
        }

        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush_if_current(scope, generation).await;
        });

        pending.insert(
            scope,
            Pending {
                patch,
                generation,
                timer: Some(timer),
            },
        );

        tracing::debug!(
            booklet_id = %self.inner.booklet_id,
            %scope,
            delay_ms = delay.as_millis() as u64,
            "Autosave scheduled"
        );
        Ok(scope)
    }

    /// Scopes with a write that has not reached the store yet.
    pub async fn pending_scopes(&self) -> Vec<Scope> {
        self.inner.pending.lock().await.keys().copied().collect()
    }

    pub async fn has_pending(&self) -> bool {
        !self.inner.pending.lock().await.is_empty()
    }

    /// Flush every pending scope edited on `step`, without waiting for
    /// their timers.
    pub async fn flush_step(&self, step: WizardStep) -> FlushReport {
        self.inner.flush_where(|scope| scope.step() == step).await
    }

    /// Flush every pending scope.
    pub async fn flush_all(&self) -> FlushReport {
        self.inner.flush_where(|_| true).await
    }

    /// Refuse further patches, wait for in-flight writes and flush
    /// everything still pending.
    pub async fn close(&self) -> FlushReport {
        self.inner.closed.store(true, Ordering::SeqCst);
        let report = self.flush_all().await;
        tracing::info!(
            booklet_id = %self.inner.booklet_id,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Autosave engine closed"
        );
        report
    }
}

impl Drop for AutosaveEngine {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Ok(pending) = self.inner.pending.try_lock() {
            if !pending.is_empty() {
                tracing::warn!(
                    booklet_id = %self.inner.booklet_id,
                    pending = pending.len(),
                    "Autosave engine dropped without close; pending timers will still fire"
                );
            }
        }
    }
}

impl Inner {
    async fn flush_if_current(self: &Arc<Self>, scope: Scope, generation: u64) {
        let lock = self.scope_lock(scope).await;
        let _serialized = lock.lock().await;

        let patch = {
            let mut pending = self.pending.lock().await;
            let current = pending.get(&scope).map(|entry| entry.generation);
            if current != Some(generation) {
                return;
            }
            pending.remove(&scope).map(|entry| entry.patch)
        };
        if let Some(patch) = patch {
            let _ = self.write_locked(scope, patch).await;
        }
    }

    /// Flush every selected scope, waiting out writes already in flight.
    ///
    /// A scope is selected while it has a pending patch or has ever been
    /// written; taking its lock waits for a timer-driven write still in
    /// backoff, and whatever that write put back is flushed again here.
    async fn flush_where(self: &Arc<Self>, select: impl Fn(Scope) -> bool) -> FlushReport {
        let mut scopes: HashSet<Scope> = self
            .pending
            .lock()
            .await
            .keys()
            .copied()
            .filter(|s| select(*s))
            .collect();
        scopes.extend(
            self.scope_locks
                .lock()
                .await
                .keys()
                .copied()
                .filter(|s| select(*s)),
        );

        let mut writes = JoinSet::new();
        for scope in scopes {
            let inner = Arc::clone(self);
            writes.spawn(async move { (scope, inner.flush_scope(scope).await) });
        }

        let mut report = FlushReport::default();
        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((scope, Some(Ok(())))) => report.saved.push(scope),
                Ok((scope, Some(Err(error)))) => report.failed.push(FailedScope { scope, error }),
                Ok((_, None)) => {}
                Err(err) => {
                    tracing::error!(booklet_id = %self.booklet_id, error = %err, "Flush task failed")
                }
            }
        }
        report
    }

    /// `None` when nothing was left to write once the scope was free.
    async fn flush_scope(self: &Arc<Self>, scope: Scope) -> Option<Result<(), String>> {
        let lock = self.scope_lock(scope).await;
        let _serialized = lock.lock().await;

        let entry = self.pending.lock().await.remove(&scope)?;
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        Some(self.write_locked(scope, entry.patch).await)
    }

    async fn scope_lock(&self, scope: Scope) -> Arc<Mutex<()>> {
        let mut locks = self.scope_locks.lock().await;
        Arc::clone(locks.entry(scope).or_default())
    }

    /// Upsert with retries. The caller holds the scope lock.
    async fn write_locked(&self, scope: Scope, patch: SectionPatch) -> Result<(), String> {
        let step = self.step.load(Ordering::SeqCst);
        let result = retry_transient(&self.config.retry, || {
            self.store.upsert_section(self.booklet_id, &patch, step)
        })
        .await;

        match result {
            Ok(((), attempts)) => {
                tracing::debug!(booklet_id = %self.booklet_id, %scope, attempts, step, "Autosave flushed");
                let _ = self.notices.send(AutosaveNotice::Saved {
                    booklet_id: self.booklet_id,
                    scope,
                    attempts,
                });
                Ok(())
            }
            Err(Exhausted { error, attempts }) => {
                tracing::warn!(
                    booklet_id = %self.booklet_id,
                    %scope,
                    attempts,
                    error = %error,
                    "Autosave failed, keeping patch pending"
                );
                self.requeue(scope, patch).await;
                let message = error.to_string();
                let _ = self.notices.send(AutosaveNotice::Failed {
                    booklet_id: self.booklet_id,
                    scope,
                    attempts,
                    error: message.clone(),
                });
                Err(message)
            }
        }
    }

    /// Put a failed patch back unless a newer one was scheduled meanwhile.
    async fn requeue(&self, scope: Scope, patch: SectionPatch) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;
        pending.entry(scope).or_insert(Pending {
            patch,
            generation,
            timer: None,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
