//! Database access, one module per table family

pub mod accounts;
pub mod orders;
pub mod revoked_tokens;
pub mod verification_codes;
