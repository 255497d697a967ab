//! Order domain model: status machine, item snapshots, totals

use super::role::Role;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer self-cancellation window in milliseconds (2 minutes)
pub const CANCELLATION_WINDOW_MS: i64 = 2 * 60 * 1000;

/// Order lifecycle status
///
/// Transition graph:
///
/// ```text
/// pending ──> confirmed ──> preparing ──> ready ──> completed
///    │            │
///    └────────────┴──> cancelled
/// ```
///
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "text", rename_all = "snake_case"))]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transitions are possible from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the transition `self -> next` exists in the graph,
    /// regardless of who requests it
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Preparing)
                | (Confirmed, Cancelled)
                | (Preparing, Ready)
                | (Ready, Completed)
        )
    }

    /// Roles allowed to request the transition `self -> next`
    ///
    /// Customers may only cancel a pending order (subject to the
    /// cancellation window, enforced at the write). All forward progress
    /// belongs to the store side.
    pub fn allowed_roles(&self, next: OrderStatus) -> &'static [Role] {
        use OrderStatus::*;
        const STAFF: &[Role] = &[Role::StoreOwner, Role::Admin];
        const CANCEL_PENDING: &[Role] = &[Role::Customer, Role::StoreOwner, Role::Admin];

        match (self, next) {
            (Pending, Cancelled) => CANCEL_PENDING,
            (Pending, Confirmed)
            | (Confirmed, Preparing)
            | (Confirmed, Cancelled)
            | (Preparing, Ready)
            | (Ready, Completed) => STAFF,
            _ => &[],
        }
    }

    /// Whether `role` may request the transition `self -> next`
    pub fn role_may_transition(&self, role: Role, next: OrderStatus) -> bool {
        self.allowed_roles(next).contains(&role)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a customer cancel requested at `now` falls inside the window
/// measured from the order's `created_at` (both epoch milliseconds)
pub fn within_cancellation_window(created_at: i64, now: i64) -> bool {
    now - created_at <= CANCELLATION_WINDOW_MS
}

/// Order line with prices frozen at creation time
///
/// Prices are snapshots supplied when the order is placed; later catalog
/// changes never affect an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    /// Undiscounted unit price at order time
    pub unit_price: Decimal,
    /// Unit price actually charged
    pub discounted_price: Decimal,
}

impl OrderItem {
    /// Amount charged for this line
    pub fn line_total(&self) -> Decimal {
        self.discounted_price * Decimal::from(self.quantity)
    }

    /// Savings for this line against the undiscounted price
    pub fn line_savings(&self) -> Decimal {
        (self.unit_price - self.discounted_price) * Decimal::from(self.quantity)
    }
}

/// Compute (total_amount, total_savings) for an order's items
pub fn order_totals(items: &[OrderItem]) -> (Decimal, Decimal) {
    items.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(amount, savings), item| (amount + item.line_total(), savings + item.line_savings()),
    )
}

/// One row of an order's append-only status history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub actor_id: String,
    pub note: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn test_forward_chain() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition(OrderStatus::Completed));
    }

    #[test]
    fn test_no_skipping() {
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Preparing));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Ready));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Completed));
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Completed));
        assert!(!OrderStatus::Preparing.can_transition(OrderStatus::Completed));
    }

    #[test]
    fn test_no_backwards() {
        assert!(!OrderStatus::Confirmed.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Ready.can_transition(OrderStatus::Preparing));
    }

    #[test]
    fn test_cancel_edges() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Preparing.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Ready.can_transition(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());

        for next in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Completed.can_transition(next));
            assert!(!OrderStatus::Cancelled.can_transition(next));
        }
    }

    #[test]
    fn test_self_transition_not_in_graph() {
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Pending));
        assert!(!OrderStatus::Preparing.can_transition(OrderStatus::Preparing));
    }

    #[test]
    fn test_role_gating() {
        // Customers can only cancel pending orders
        assert!(OrderStatus::Pending.role_may_transition(Role::Customer, OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.role_may_transition(Role::Customer, OrderStatus::Confirmed));
        assert!(
            !OrderStatus::Confirmed.role_may_transition(Role::Customer, OrderStatus::Cancelled)
        );

        // Store owners drive the forward chain
        assert!(OrderStatus::Pending.role_may_transition(Role::StoreOwner, OrderStatus::Confirmed));
        assert!(OrderStatus::Ready.role_may_transition(Role::StoreOwner, OrderStatus::Completed));
        assert!(
            OrderStatus::Confirmed.role_may_transition(Role::StoreOwner, OrderStatus::Cancelled)
        );

        // Admin mirrors store-owner rights
        assert!(OrderStatus::Preparing.role_may_transition(Role::Admin, OrderStatus::Ready));

        // Illegal edges grant nothing to anyone
        assert!(OrderStatus::Pending.allowed_roles(OrderStatus::Completed).is_empty());
        assert!(OrderStatus::Completed.allowed_roles(OrderStatus::Pending).is_empty());
    }

    #[test]
    fn test_cancellation_window_boundaries() {
        let created = 1_700_000_000_000;
        // 119 seconds later: inside
        assert!(within_cancellation_window(created, created + 119_000));
        // exactly 120 seconds: still inside (inclusive)
        assert!(within_cancellation_window(created, created + 120_000));
        // 121 seconds: outside
        assert!(!within_cancellation_window(created, created + 121_000));
    }

    #[test]
    fn test_order_totals() {
        let items = vec![
            OrderItem {
                product_id: "p1".into(),
                product_name: "Apples".into(),
                quantity: 3,
                unit_price: Decimal::new(250, 2),        // 2.50
                discounted_price: Decimal::new(200, 2),  // 2.00
            },
            OrderItem {
                product_id: "p2".into(),
                product_name: "Bread".into(),
                quantity: 1,
                unit_price: Decimal::new(399, 2),        // 3.99
                discounted_price: Decimal::new(399, 2),  // no discount
            },
        ];

        let (total, savings) = order_totals(&items);
        assert_eq!(total, Decimal::new(999, 2)); // 3*2.00 + 3.99
        assert_eq!(savings, Decimal::new(150, 2)); // 3*0.50
    }

    #[test]
    fn test_order_totals_empty() {
        let (total, savings) = order_totals(&[]);
        assert_eq!(total, Decimal::ZERO);
        assert_eq!(savings, Decimal::ZERO);
    }

    #[test]
    fn test_order_item_serde() {
        let item = OrderItem {
            product_id: "p1".into(),
            product_name: "Milk".into(),
            quantity: 2,
            unit_price: Decimal::new(150, 2),
            discounted_price: Decimal::new(120, 2),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: OrderItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
