//! Back-office service library crate.
//!
//! # Purpose
//! Exposes the admin API surface, token and RBAC middleware, configuration,
//! and storage implementations for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod observability;
pub mod store;
