//! Identity extraction and request authorization for the `/admin` API.
//!
//! # Notes
//! Tokens carry only a subject id and a role alias; permissions are always
//! resolved server-side through the policy engine.
pub mod middleware;
pub mod token;
