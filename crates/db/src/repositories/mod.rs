//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods. Reads take
//! `&PgPool`; writes that take part in a store transaction take
//! `&mut PgConnection` so they can run on `&mut *tx`.

pub mod booklet_repo;
pub mod content_repo;
pub mod event_repo;
pub mod pin_repo;

pub use booklet_repo::{BookletRepo, SectionColumn};
pub use content_repo::{EquipmentRepo, FaqRepo, GalleryRepo, PlaceRepo};
pub use event_repo::EventRepo;
pub use pin_repo::PinRepo;
