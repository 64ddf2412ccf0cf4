//! Hostbook domain core.
//!
//! Booklet content model, the equipment step normalizer, the visibility
//! classifier, the autosave engine, the wizard controller and the
//! publication protocol. Persistence is reached only through the
//! [`store::DraftStore`] capability.

pub mod access_code;
pub mod assistant;
pub mod autosave;
pub mod booklet;
pub mod disclosure;
pub mod editor;
pub mod error;
pub mod media;
pub mod patch;
pub mod publication;
pub mod retry;
pub mod steps;
pub mod store;
pub mod types;
pub mod visibility;
pub mod wizard;
