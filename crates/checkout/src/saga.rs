//! Per-checkout saga journal.

use common::{OrderId, UserId};
use domain::PaymentResult;

use crate::state::CheckoutState;

/// Tracks one checkout as it runs: which steps completed, what they
/// produced, and why the checkout failed if it did.
///
/// The coordinator consults the completed steps to decide which
/// compensating actions apply. The journal lives only for the duration of
/// the request; durable follow-up goes to the reconciliation log.
#[derive(Debug, Clone)]
pub struct CheckoutSaga {
    user_id: UserId,
    state: CheckoutState,
    current_step: Option<&'static str>,
    completed_steps: Vec<&'static str>,
    payment: Option<PaymentResult>,
    order_id: Option<OrderId>,
    failure_reason: Option<String>,
}

impl CheckoutSaga {
    /// Starts a checkout for `user_id`.
    pub fn start(user_id: UserId) -> Self {
        Self {
            user_id,
            state: CheckoutState::Pending,
            current_step: None,
            completed_steps: Vec::new(),
            payment: None,
            order_id: None,
            failure_reason: None,
        }
    }

    pub fn step_started(&mut self, step: &'static str) {
        tracing::debug!(user_id = %self.user_id, step, "checkout step started");
        self.current_step = Some(step);
    }

    pub fn step_completed(&mut self, step: &'static str) {
        self.completed_steps.push(step);
        self.current_step = None;
    }

    /// Records the authorized payment along with the step that produced it.
    pub fn payment_captured(&mut self, step: &'static str, payment: PaymentResult) {
        self.payment = Some(payment);
        self.state = CheckoutState::Charged;
        self.step_completed(step);
    }

    /// Records the committed order. From here on nothing is compensated.
    pub fn order_recorded(&mut self, step: &'static str, order_id: OrderId) {
        self.order_id = Some(order_id);
        self.state = CheckoutState::Placed;
        self.step_completed(step);
    }

    pub fn step_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(
            user_id = %self.user_id,
            step = self.current_step.unwrap_or("unknown"),
            %reason,
            "checkout step failed"
        );
        self.failure_reason = Some(reason);
    }

    /// Moves to `Compensating`. Returns false if there is no captured
    /// payment to give back.
    pub fn begin_compensation(&mut self) -> bool {
        if !self.state.holds_charge() {
            return false;
        }
        self.state = CheckoutState::Compensating;
        true
    }

    pub fn fail(&mut self) {
        self.state = CheckoutState::Failed;
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed_steps
    }

    /// Returns the authorized payment, if that step completed.
    pub fn payment(&self) -> Option<&PaymentResult> {
        self.payment.as_ref()
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::PaymentMethod;

    use super::*;
    use crate::steps::{STEP_AUTHORIZE_PAYMENT, STEP_READ_CART, STEP_RECORD_ORDER};

    fn payment() -> PaymentResult {
        PaymentResult {
            success: true,
            transaction_id: "TXN-1".to_string(),
            amount: Money::from_cents(500),
            method: PaymentMethod::PayPal,
        }
    }

    #[test]
    fn test_happy_path_records_steps_in_order() {
        let mut saga = CheckoutSaga::start(UserId::new(3));
        assert_eq!(saga.state(), CheckoutState::Pending);

        saga.step_started(STEP_READ_CART);
        saga.step_completed(STEP_READ_CART);
        saga.step_started(STEP_AUTHORIZE_PAYMENT);
        saga.payment_captured(STEP_AUTHORIZE_PAYMENT, payment());
        assert_eq!(saga.state(), CheckoutState::Charged);
        saga.step_started(STEP_RECORD_ORDER);
        saga.order_recorded(STEP_RECORD_ORDER, OrderId::new(9));

        assert_eq!(
            saga.completed_steps(),
            &[STEP_READ_CART, STEP_AUTHORIZE_PAYMENT, STEP_RECORD_ORDER]
        );
        assert_eq!(saga.payment().map(|p| p.transaction_id.as_str()), Some("TXN-1"));
        assert_eq!(saga.order_id(), Some(OrderId::new(9)));
        assert_eq!(saga.state(), CheckoutState::Placed);
        assert!(!saga.begin_compensation());
        assert!(saga.failure_reason().is_none());
    }

    #[test]
    fn test_compensation_needs_a_captured_payment() {
        let mut saga = CheckoutSaga::start(UserId::new(3));
        assert!(!saga.begin_compensation());

        saga.payment_captured(STEP_AUTHORIZE_PAYMENT, payment());
        saga.step_failed("store down");
        assert!(saga.begin_compensation());
        assert_eq!(saga.state(), CheckoutState::Compensating);
        assert!(!saga.begin_compensation());

        saga.fail();
        assert_eq!(saga.state(), CheckoutState::Failed);
        assert_eq!(saga.failure_reason(), Some("store down"));
    }
}
