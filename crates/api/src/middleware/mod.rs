//! Request extractors.
//!
//! - [`auth::Operator`]: the operator behind a Bearer token.

pub mod auth;
