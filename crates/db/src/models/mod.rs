//! Row structs for the booklet tables.
//!
//! Each row is a `FromRow` struct matching the table layout, with a
//! conversion into the `hostbook-core` domain type.

pub mod booklet;
pub mod content;
pub mod event;
pub mod pin;
