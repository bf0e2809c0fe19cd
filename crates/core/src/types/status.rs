//! Status enums for orders, payments, and reconciliation incidents.

use serde::{Deserialize, Serialize};

/// Payment state of an order.
///
/// Independent of fulfillment: set to `Paid` only after signature and
/// capture verification succeed, or immediately kept `Pending` for
/// cash-on-delivery orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery. The order is created unpaid.
    Direct,
    /// Hosted payment gateway. The order is created only after the
    /// signed callback verifies.
    Gateway,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Gateway => write!(f, "gateway"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "gateway" => Ok(Self::Gateway),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Order fulfillment state machine.
///
/// Orders move strictly forward along
/// `pending -> processing -> shipping -> out_for_delivery -> delivered`.
/// Any active state can be cancelled; a delivered order can only resolve
/// into a return decision. `Cancelled`, `ReturnAccepted`, and
/// `ReturnNotAccepted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Processing,
    Shipping,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnAccepted,
    ReturnNotAccepted,
}

impl FulfillmentStatus {
    /// Whether `self` may move to `next`.
    ///
    /// The table never allows moving backward, re-entering the current
    /// state, or leaving a terminal state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Processing | Self::Cancelled),
            Self::Processing => matches!(next, Self::Shipping | Self::Cancelled),
            Self::Shipping => matches!(next, Self::OutForDelivery | Self::Cancelled),
            Self::OutForDelivery => matches!(next, Self::Delivered | Self::Cancelled),
            Self::Delivered => matches!(next, Self::ReturnAccepted | Self::ReturnNotAccepted),
            Self::Cancelled | Self::ReturnAccepted | Self::ReturnNotAccepted => false,
        }
    }

    /// Whether no further transitions are possible from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::ReturnAccepted | Self::ReturnNotAccepted
        )
    }

    /// All states, in pipeline order. Used by admin listings.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Pending,
            Self::Processing,
            Self::Shipping,
            Self::OutForDelivery,
            Self::Delivered,
            Self::Cancelled,
            Self::ReturnAccepted,
            Self::ReturnNotAccepted,
        ]
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipping => write!(f, "shipping"),
            Self::OutForDelivery => write!(f, "out_for_delivery"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ReturnAccepted => write!(f, "return_accepted"),
            Self::ReturnNotAccepted => write!(f, "return_not_accepted"),
        }
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipping" => Ok(Self::Shipping),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "return_accepted" => Ok(Self::ReturnAccepted),
            "return_not_accepted" => Ok(Self::ReturnNotAccepted),
            _ => Err(format!("invalid fulfillment status: {s}")),
        }
    }
}

/// Lifecycle of a payment intent handed to the gateway.
///
/// An intent is consumed exactly once; the `Created -> Consumed` flip is
/// the idempotency gate for callback processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[default]
    Created,
    Consumed,
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Consumed => write!(f, "consumed"),
        }
    }
}

impl std::str::FromStr for IntentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "consumed" => Ok(Self::Consumed),
            _ => Err(format!("invalid intent status: {s}")),
        }
    }
}

/// State of a payment reconciliation incident.
///
/// Opened when money was captured but the order could not be committed;
/// resolved manually from the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    #[default]
    Open,
    Resolved,
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            _ => Err(format!("invalid incident status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // ==========================================================================
    // Fulfillment transition table
    // ==========================================================================

    #[test]
    fn test_forward_chain_is_allowed() {
        use FulfillmentStatus::{
            Delivered, OutForDelivery, Pending, Processing, Shipping,
        };

        let chain = [Pending, Processing, Shipping, OutForDelivery, Delivered];
        for pair in chain.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_active_states_can_cancel() {
        use FulfillmentStatus::{Cancelled, OutForDelivery, Pending, Processing, Shipping};

        for from in [Pending, Processing, Shipping, OutForDelivery] {
            assert!(from.can_transition_to(Cancelled), "{from} -> cancelled");
        }
    }

    #[test]
    fn test_delivered_only_resolves_returns() {
        use FulfillmentStatus::{Delivered, ReturnAccepted, ReturnNotAccepted};

        assert!(Delivered.can_transition_to(ReturnAccepted));
        assert!(Delivered.can_transition_to(ReturnNotAccepted));
        for next in FulfillmentStatus::all() {
            if next == ReturnAccepted || next == ReturnNotAccepted {
                continue;
            }
            assert!(!Delivered.can_transition_to(next), "delivered -> {next}");
        }
    }

    #[test]
    fn test_no_backward_transitions() {
        use FulfillmentStatus::{Delivered, Pending, Processing, Shipping};

        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Processing));
        assert!(!Shipping.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states_are_stuck() {
        for from in FulfillmentStatus::all() {
            if !from.is_terminal() {
                continue;
            }
            for next in FulfillmentStatus::all() {
                assert!(!from.can_transition_to(next), "{from} -> {next}");
            }
        }
    }

    #[test]
    fn test_self_transitions_rejected() {
        for status in FulfillmentStatus::all() {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_skipping_stages_rejected() {
        use FulfillmentStatus::{Delivered, OutForDelivery, Pending, Shipping};

        assert!(!Pending.can_transition_to(Shipping));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(OutForDelivery));
    }

    // ==========================================================================
    // Text codecs
    // ==========================================================================

    #[test]
    fn test_fulfillment_display_from_str_roundtrip() {
        for status in FulfillmentStatus::all() {
            let text = status.to_string();
            assert_eq!(FulfillmentStatus::from_str(&text), Ok(status));
        }
        assert!(FulfillmentStatus::from_str("teleported").is_err());
    }

    #[test]
    fn test_payment_status_codec() {
        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
        assert_eq!(PaymentStatus::from_str("pending"), Ok(PaymentStatus::Pending));
        assert_eq!(PaymentStatus::from_str("failed"), Ok(PaymentStatus::Failed));
        assert!(PaymentStatus::from_str("refunded").is_err());
    }

    #[test]
    fn test_payment_method_codec() {
        assert_eq!(PaymentMethod::Direct.to_string(), "direct");
        assert_eq!(PaymentMethod::from_str("gateway"), Ok(PaymentMethod::Gateway));
        assert!(PaymentMethod::from_str("carrier-pigeon").is_err());
    }

    #[test]
    fn test_intent_and_incident_codecs() {
        assert_eq!(IntentStatus::from_str("consumed"), Ok(IntentStatus::Consumed));
        assert_eq!(IncidentStatus::from_str("open"), Ok(IncidentStatus::Open));
        assert_eq!(IncidentStatus::Resolved.to_string(), "resolved");
        assert!(IntentStatus::from_str("spent").is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&FulfillmentStatus::OutForDelivery).expect("serialize");
        assert_eq!(json, "\"out_for_delivery\"");
        let back: PaymentMethod = serde_json::from_str("\"direct\"").expect("deserialize");
        assert_eq!(back, PaymentMethod::Direct);
    }
}
