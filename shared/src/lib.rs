//! Shared types for the FreshCart marketplace core
//!
//! Common types used by the server crate: the unified error system,
//! domain models (roles, order lifecycle), and time utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
