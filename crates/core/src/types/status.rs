//! Status and kind enums for stored entities.
//!
//! Each enum maps to a `PostgreSQL` enum type in the `shop` schema when the
//! `postgres` feature is enabled, and to the same lowercase strings in JSON.

use serde::{Deserialize, Serialize};

/// Error returned by the `FromStr` impls in this module.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle of an order.
///
/// ```text
/// ordered ──> shipped ──> out_for_delivery ──> delivered ──> refund_generated ──> refunded
///    │           │                                               ^
///    └───────────┴──> canceled ──────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Ordered,
    Shipped,
    OutForDelivery,
    Delivered,
    Canceled,
    RefundGenerated,
    Refunded,
}

/// Rejected order status change.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
            Self::RefundGenerated => "refund_generated",
            Self::Refunded => "refunded",
        }
    }

    /// Whether an order in `self` may be moved to `next`.
    ///
    /// Staying in the same status is not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Ordered, Self::Shipped | Self::Canceled)
                | (
                    Self::Shipped,
                    Self::OutForDelivery | Self::Delivered | Self::Canceled
                )
                | (Self::OutForDelivery, Self::Delivered)
                | (Self::Delivered | Self::Canceled, Self::RefundGenerated)
                | (Self::RefundGenerated, Self::Refunded)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError` when [`Self::can_transition_to`] is false.
    pub const fn transition_to(self, next: Self) -> Result<Self, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Whether items of an order in this status are still held out of stock
    /// and go back on the shelf when the order is canceled or deleted.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        matches!(self, Self::Ordered | Self::Shipped)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(Self::Ordered),
            "shipped" => Ok(Self::Shipped),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            "refund_generated" => Ok(Self::RefundGenerated),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Settlement state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_mode", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMode {
    /// Cash on delivery.
    #[default]
    Cod,
    /// Paid through the payment gateway.
    Online,
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cod => write!(f, "COD"),
            Self::Online => write!(f, "ONLINE"),
        }
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COD" => Ok(Self::Cod),
            "ONLINE" => Ok(Self::Online),
            _ => Err(ParseEnumError::new("payment mode", s)),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Whether a product stands alone or is a variant of a main product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.product_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    Single,
    Variant,
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Variant => write!(f, "variant"),
        }
    }
}

impl std::str::FromStr for ProductType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "variant" => Ok(Self::Variant),
            _ => Err(ParseEnumError::new("product type", s)),
        }
    }
}

/// Placement of a storefront display component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.component_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Slider,
    Banner,
    Logo,
    Popup,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slider => write!(f, "slider"),
            Self::Banner => write!(f, "banner"),
            Self::Logo => write!(f, "logo"),
            Self::Popup => write!(f, "popup"),
        }
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slider" => Ok(Self::Slider),
            "banner" => Ok(Self::Banner),
            "logo" => Ok(Self::Logo),
            "popup" => Ok(Self::Popup),
            _ => Err(ParseEnumError::new("component kind", s)),
        }
    }
}

// =============================================================================
// Staff
// =============================================================================

/// Staff role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.staff_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Everything, including managing other staff accounts.
    SuperAdmin,
    /// Catalog, order and customer management.
    Admin,
    /// Read-only access to back-office data.
    Viewer,
}

impl StaffRole {
    /// Whether the role may create, update or delete store data.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// Whether the role may manage staff accounts.
    #[must_use]
    pub const fn can_manage_staff(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for StaffRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(ParseEnumError::new("staff role", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL_ORDER_STATUSES: [OrderStatus; 7] = [
        OrderStatus::Ordered,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
        OrderStatus::RefundGenerated,
        OrderStatus::Refunded,
    ];

    #[test]
    fn test_order_happy_path_transitions() {
        let path = [
            OrderStatus::Ordered,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::RefundGenerated,
            OrderStatus::Refunded,
        ];
        for pair in path.windows(2) {
            let [from, to] = pair else { unreachable!() };
            assert!(from.can_transition_to(*to), "{from} -> {to}");
        }
    }

    #[test]
    fn test_order_rejects_backwards_and_self_transitions() {
        for status in ALL_ORDER_STATUSES {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Canceled.can_transition_to(OrderStatus::Ordered));
    }

    #[test]
    fn test_refunded_is_terminal() {
        for next in ALL_ORDER_STATUSES {
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn test_every_cancelable_status_holds_stock() {
        for status in ALL_ORDER_STATUSES {
            if status.can_transition_to(OrderStatus::Canceled) {
                assert!(status.holds_stock(), "{status} -> canceled leaks stock");
            }
        }
        assert!(OrderStatus::Shipped.holds_stock());
        assert!(!OrderStatus::Delivered.holds_stock());
        assert!(!OrderStatus::Canceled.holds_stock());
    }

    #[test]
    fn test_transition_to_reports_both_ends() {
        let err = OrderStatus::Delivered
            .transition_to(OrderStatus::Ordered)
            .unwrap_err();
        assert_eq!(err.to_string(), "order cannot move from delivered to ordered");
    }

    #[test]
    fn test_order_status_string_roundtrip() {
        for status in ALL_ORDER_STATUSES {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_payment_mode_is_case_insensitive() {
        assert_eq!("cod".parse::<PaymentMode>().unwrap(), PaymentMode::Cod);
        assert_eq!("Online".parse::<PaymentMode>().unwrap(), PaymentMode::Online);
        assert_eq!(
            serde_json::to_string(&PaymentMode::Online).unwrap(),
            "\"ONLINE\""
        );
        assert!("card".parse::<PaymentMode>().is_err());
    }

    #[test]
    fn test_staff_role_permissions() {
        assert!(StaffRole::SuperAdmin.can_manage_staff());
        assert!(!StaffRole::Admin.can_manage_staff());
        assert!(StaffRole::Admin.can_write());
        assert!(!StaffRole::Viewer.can_write());
    }

    #[test]
    fn test_component_kind_parse() {
        assert_eq!("popup".parse::<ComponentKind>().unwrap(), ComponentKind::Popup);
        let err = "carousel".parse::<ComponentKind>().unwrap_err();
        assert_eq!(err.to_string(), "invalid component kind: carousel");
    }
}
