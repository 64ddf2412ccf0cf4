//! Hostbook event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`BookletEvent`]: the lifecycle event envelope.
//! - [`EventPersistence`] and [`EventLogger`]: background consumers.

pub mod bus;
pub mod persistence;

pub use bus::{event_types, BookletEvent, EventBus};
pub use persistence::{EventLogger, EventPersistence};
