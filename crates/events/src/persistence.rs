//! Background consumers of the event bus.
//!
//! [`EventPersistence`] writes every event to the `booklet_events` table.
//! [`EventLogger`] only logs them and is used when the service runs without
//! a database. Both stop when the bus closes or the token is cancelled.

use hostbook_db::repositories::EventRepo;
use hostbook_db::DbPool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::BookletEvent;

/// Receive events until the channel closes or `cancel` fires.
async fn consume<F, Fut>(
    mut receiver: broadcast::Receiver<BookletEvent>,
    cancel: CancellationToken,
    name: &'static str,
    mut handle: F,
) where
    F: FnMut(BookletEvent) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(consumer = name, "Event consumer cancelled");
                break;
            }
            received = receiver.recv() => received,
        };
        match received {
            Ok(event) => handle(event).await,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(consumer = name, skipped = n, "Event consumer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!(consumer = name, "Event bus closed, consumer shutting down");
                break;
            }
        }
    }
}

pub struct EventPersistence;

impl EventPersistence {
    pub async fn run(
        pool: DbPool,
        receiver: broadcast::Receiver<BookletEvent>,
        cancel: CancellationToken,
    ) {
        consume(receiver, cancel, "persistence", |event| {
            let pool = pool.clone();
            async move {
                let inserted = EventRepo::insert(
                    &pool,
                    &event.event_type,
                    event.booklet_id,
                    event.actor_user_id,
                    &event.payload,
                )
                .await;
                if let Err(e) = inserted {
                    tracing::error!(
                        error = %e,
                        event_type = %event.event_type,
                        "Failed to persist event"
                    );
                }
            }
        })
        .await;
    }
}

pub struct EventLogger;

impl EventLogger {
    pub async fn run(receiver: broadcast::Receiver<BookletEvent>, cancel: CancellationToken) {
        consume(receiver, cancel, "logger", |event| async move {
            tracing::info!(
                event_type = %event.event_type,
                booklet_id = ?event.booklet_id,
                actor_user_id = ?event.actor_user_id,
                payload = %event.payload,
                "Booklet event"
            );
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{event_types, EventBus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn consumer_stops_when_the_bus_is_dropped() {
        let bus = EventBus::default();
        let receiver = bus.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        bus.publish(BookletEvent::new(event_types::BOOKLET_CREATED));
        bus.publish(BookletEvent::new(event_types::BOOKLET_PUBLISHED));
        drop(bus);

        consume(receiver, CancellationToken::new(), "test", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn logger_stops_on_cancellation() {
        let bus = EventBus::default();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(EventLogger::run(bus.subscribe(), cancel.clone()));

        bus.publish(BookletEvent::new(event_types::BOOKLET_ENABLED));
        cancel.cancel();
        task.await.unwrap();
    }
}
