//! Session tokens, auth middleware, and rate limiting

pub mod middleware;
pub mod rate_limit;
pub mod session;

pub use middleware::Identity;
