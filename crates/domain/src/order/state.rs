//! Order and payment state machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Processing ──► Reserved ──► PaymentProcessing ──► PaymentApproved ──► Completed
///     │              │                │
///     └──────────────┴────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order is being assembled; the vehicle is not yet held.
    #[default]
    Processing,

    /// The vehicle is reserved for the customer, awaiting payment.
    Reserved,

    /// A payment was created with the gateway and is awaiting an outcome.
    PaymentProcessing,

    /// The gateway approved the payment; the vehicle is not yet out of stock.
    PaymentApproved,

    /// The vehicle left the inventory (terminal state).
    Completed,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Processing,
        OrderStatus::Reserved,
        OrderStatus::PaymentProcessing,
        OrderStatus::PaymentApproved,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the state machine allows moving from `self` to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Processing, Reserved)
                | (Reserved, PaymentProcessing)
                | (PaymentProcessing, PaymentApproved)
                | (PaymentApproved, Completed)
                | (Processing | Reserved | PaymentProcessing, Cancelled)
        )
    }

    /// Validates a transition, distinguishing terminal sources from undefined edges.
    pub fn check_transition(&self, target: OrderStatus) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::TerminalState {
                current_status: *self,
                target,
            });
        }
        if !self.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                current_status: *self,
                target,
            });
        }
        Ok(())
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Returns true if cancelling from this status must release the vehicle.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, OrderStatus::Reserved | OrderStatus::PaymentProcessing)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Reserved => "Reserved",
            OrderStatus::PaymentProcessing => "PaymentProcessing",
            OrderStatus::PaymentApproved => "PaymentApproved",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// The status of the payment tracked alongside the order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// No payment has been requested yet.
    #[default]
    Pending,

    /// The gateway accepted a payment request and has not settled it.
    Processing,

    /// The gateway reported the payment as paid.
    Approved,

    /// The gateway declined the payment.
    Declined,

    /// The payment was cancelled, by the gateway or with the order.
    Cancelled,
}

impl PaymentStatus {
    /// All payment statuses.
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Approved,
        PaymentStatus::Declined,
        PaymentStatus::Cancelled,
    ];

    /// Returns true while the payment has no outcome yet.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Approved => "Approved",
            PaymentStatus::Declined => "Declined",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// A settled payment result, as reported by a webhook or a manual confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Approved,
    Declined,
    Cancelled,
}

impl PaymentOutcome {
    /// The payment status recorded for this outcome.
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Approved => PaymentStatus::Approved,
            PaymentOutcome::Declined => PaymentStatus::Declined,
            PaymentOutcome::Cancelled => PaymentStatus::Cancelled,
        }
    }

    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        self.payment_status().as_str()
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<PaymentStatus> for PaymentOutcome {
    type Error = PaymentStatus;

    /// Open statuses have no outcome and are handed back unchanged.
    fn try_from(status: PaymentStatus) -> Result<Self, Self::Error> {
        match status {
            PaymentStatus::Approved => Ok(PaymentOutcome::Approved),
            PaymentStatus::Declined => Ok(PaymentOutcome::Declined),
            PaymentStatus::Cancelled => Ok(PaymentOutcome::Cancelled),
            open => Err(open),
        }
    }
}

impl FromStr for PaymentOutcome {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status: PaymentStatus = s.parse()?;
        PaymentOutcome::try_from(status).map_err(|_| OrderError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_statuses() {
        assert_eq!(OrderStatus::default(), OrderStatus::Processing);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_forward_path_is_allowed() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Reserved));
        assert!(OrderStatus::Reserved.can_transition_to(OrderStatus::PaymentProcessing));
        assert!(OrderStatus::PaymentProcessing.can_transition_to(OrderStatus::PaymentApproved));
        assert!(OrderStatus::PaymentApproved.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        assert!(!OrderStatus::Reserved.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Reserved.can_transition_to(OrderStatus::PaymentApproved));
        assert!(!OrderStatus::PaymentProcessing.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::PaymentApproved.can_transition_to(OrderStatus::Reserved));
    }

    #[test]
    fn test_can_cancel_before_payment_approval() {
        assert!(OrderStatus::Processing.can_cancel());
        assert!(OrderStatus::Reserved.can_cancel());
        assert!(OrderStatus::PaymentProcessing.can_cancel());
        assert!(!OrderStatus::PaymentApproved.can_cancel());
        assert!(!OrderStatus::Completed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_holds_reservation() {
        assert!(!OrderStatus::Processing.holds_reservation());
        assert!(OrderStatus::Reserved.holds_reservation());
        assert!(OrderStatus::PaymentProcessing.holds_reservation());
        assert!(!OrderStatus::PaymentApproved.holds_reservation());
    }

    #[test]
    fn test_terminal_states_reject_every_target() {
        for source in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(source.is_terminal());
            for target in OrderStatus::ALL {
                assert!(matches!(
                    source.check_transition(target),
                    Err(OrderError::TerminalState { .. })
                ));
            }
        }
    }

    #[test]
    fn test_check_transition_reports_undefined_edge() {
        let err = OrderStatus::PaymentApproved
            .check_transition(OrderStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_parse_status_names() {
        assert_eq!(
            "PaymentProcessing".parse::<OrderStatus>().unwrap(),
            OrderStatus::PaymentProcessing
        );
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("Shipped".parse::<OrderStatus>().is_err());
        assert_eq!("Declined".parse::<PaymentStatus>().unwrap(), PaymentStatus::Declined);
    }

    #[test]
    fn test_payment_outcome_conversions() {
        assert_eq!(
            PaymentOutcome::try_from(PaymentStatus::Approved),
            Ok(PaymentOutcome::Approved)
        );
        assert_eq!(
            PaymentOutcome::try_from(PaymentStatus::Processing),
            Err(PaymentStatus::Processing)
        );
        assert_eq!(PaymentOutcome::Declined.payment_status(), PaymentStatus::Declined);
        assert!("Pending".parse::<PaymentOutcome>().is_err());
        assert_eq!("Cancelled".parse::<PaymentOutcome>().unwrap(), PaymentOutcome::Cancelled);
    }

    #[test]
    fn test_open_payment_statuses() {
        assert!(PaymentStatus::Pending.is_open());
        assert!(PaymentStatus::Processing.is_open());
        assert!(!PaymentStatus::Approved.is_open());
        assert!(!PaymentStatus::Declined.is_open());
        assert!(!PaymentStatus::Cancelled.is_open());
    }

    #[test]
    fn test_serialization() {
        let status = OrderStatus::PaymentApproved;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"PaymentApproved\"");
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
