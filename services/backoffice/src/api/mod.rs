//! Back-office HTTP API module.
//!
//! # Purpose
//! Route handlers for roles, menu rules, admin accounts and system health.
pub mod admins;
pub mod error;
pub mod openapi;
pub mod roles;
pub mod rules;
pub mod system;
pub mod types;
