//! Bearer-token validation for operator routes.

pub mod jwt;
