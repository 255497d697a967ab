//! Domain models shared between the server and its clients

pub mod order;
pub mod role;

pub use order::{OrderItem, OrderStatus, StatusHistoryEntry, CANCELLATION_WINDOW_MS};
pub use role::Role;
