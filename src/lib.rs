//! A quickstart greeting service with axum.

pub mod feature;
pub mod infra;
pub mod server;
