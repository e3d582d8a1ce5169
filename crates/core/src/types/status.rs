//! Status and role enums, with the transition rules that govern them.
//!
//! Every enum here is stored as `TEXT` in the database using its snake case
//! name, so the same string is used in JSON, SQL and logs.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display`, `FromStr` and (with the `postgres`
/// feature) TEXT-backed sqlx traits for a fieldless enum.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical snake case name.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let raw = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(raw.parse::<Self>()?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

// =============================================================================
// Users
// =============================================================================

/// Account role. Authorization is a single role check per handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper account.
    #[default]
    User,
    /// Store administrator.
    Admin,
}

text_enum!(UserRole, "user role", { User => "user", Admin => "admin" });

impl UserRole {
    /// Whether this role may use the admin console.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order fulfillment status.
///
/// ```text
/// pending -> confirmed -> processing -> shipped -> delivered
///    \           \             \
///     +-----------+-------------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an admin may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether the shopper who placed the order may still cancel it.
    #[must_use]
    pub const fn is_customer_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether the order counts towards revenue.
    #[must_use]
    pub const fn counts_as_revenue(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Order payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// Whether an admin may move a payment from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Failed)
                | (Self::Failed, Self::Pending | Self::Paid)
                | (Self::Paid, Self::Refunded)
        )
    }
}

/// Payment method tag chosen at checkout. No provider is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    CashOnDelivery,
    BankTransfer,
}

text_enum!(PaymentMethod, "payment method", {
    Card => "card",
    Paypal => "paypal",
    CashOnDelivery => "cash_on_delivery",
    BankTransfer => "bank_transfer",
});

// =============================================================================
// Inventory
// =============================================================================

/// Stock transfer status between warehouses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    InTransit,
    Completed,
    Cancelled,
}

text_enum!(TransferStatus, "transfer status", {
    Pending => "pending",
    InTransit => "in_transit",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TransferStatus {
    /// Whether a transfer may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InTransit | Self::Cancelled)
                | (Self::InTransit, Self::Completed | Self::Cancelled)
        )
    }
}

// =============================================================================
// Marketing
// =============================================================================

/// How a coupon's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the subtotal.
    Percentage,
    /// `value` is a fixed amount off.
    Fixed,
}

text_enum!(DiscountType, "discount type", { Percentage => "percentage", Fixed => "fixed" });

// =============================================================================
// Support
// =============================================================================

/// Support ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

text_enum!(TicketStatus, "ticket status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

impl TicketStatus {
    /// Whether new replies are accepted.
    #[must_use]
    pub const fn accepts_replies(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Support ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

text_enum!(TicketPriority, "ticket priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// Support chat conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Open,
    Closed,
}

text_enum!(ConversationStatus, "conversation status", { Open => "open", Closed => "closed" });

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderStatus,
    TicketReply,
    ChatMessage,
    System,
}

text_enum!(NotificationKind, "notification kind", {
    OrderPlaced => "order_placed",
    OrderStatus => "order_status",
    TicketReply => "ticket_reply",
    ChatMessage => "chat_message",
    System => "system",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_forward_path() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn test_order_status_rejects_skips_and_reversals() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in OrderStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_customer_cancellable() {
        assert!(OrderStatus::Pending.is_customer_cancellable());
        assert!(OrderStatus::Confirmed.is_customer_cancellable());
        assert!(!OrderStatus::Processing.is_customer_cancellable());
    }

    #[test]
    fn test_transfer_transitions() {
        use TransferStatus::*;
        assert!(Pending.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Completed));
        assert!(InTransit.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_text_round_trip_and_serde_agree() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"cash_on_delivery\""
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "superuser".parse::<UserRole>().unwrap_err();
        assert_eq!(err.to_string(), "invalid user role: superuser");
    }

    #[test]
    fn test_payment_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
    }
}
