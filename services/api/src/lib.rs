//! services/api/src/lib.rs
//!
//! The CookStack HTTP service: configuration, adapters for the core ports,
//! the authentication services and the axum router.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod web;
