//! Convocation attendance backend library
//!
//! Exposes the access layer, storage and HTTP router for the binary and
//! the integration tests.

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod store;
