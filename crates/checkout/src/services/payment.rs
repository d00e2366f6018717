//! Payment gateway trait and simulated implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::{PaymentMethod, PaymentResult};

use super::{PAYMENT_SERVICE, read, write};
use crate::error::ServiceError;

/// Trait for payment processing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorizes and captures `amount` using `method`.
    ///
    /// A gateway may report a refusal either as `Ok` with `success: false`
    /// or as [`ServiceError::Declined`].
    async fn authorize(
        &self,
        method: &PaymentMethod,
        amount: Money,
    ) -> Result<PaymentResult, ServiceError>;

    /// Refunds a previously captured payment.
    async fn refund(&self, transaction_id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct SimulatedPaymentState {
    captured: HashMap<String, PaymentResult>,
    refunded: Vec<String>,
    next_id: u64,
    authorizations: usize,
    decline: bool,
    unavailable: bool,
    fail_on_refund: bool,
}

/// Payment gateway that approves every charge after a fixed latency.
///
/// Transaction ids are `TXN-1`, `TXN-2`, ... in issue order. Faults can be
/// injected for tests.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPaymentGateway {
    latency: Duration,
    state: Arc<RwLock<SimulatedPaymentState>>,
}

impl SimulatedPaymentGateway {
    /// Creates a gateway that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that waits `latency` before every authorization.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Configures the gateway to decline every charge.
    pub fn set_decline(&self, decline: bool) {
        write(&self.state).decline = decline;
    }

    /// Configures the gateway to be unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        write(&self.state).unavailable = unavailable;
    }

    /// Configures the gateway to fail every refund.
    pub fn set_fail_on_refund(&self, fail: bool) {
        write(&self.state).fail_on_refund = fail;
    }

    /// Returns the number of captured payments that were not refunded.
    pub fn payment_count(&self) -> usize {
        read(&self.state).captured.len()
    }

    /// Returns the number of authorization calls received.
    pub fn authorization_count(&self) -> usize {
        read(&self.state).authorizations
    }

    /// Returns true if the transaction was refunded.
    pub fn is_refunded(&self, transaction_id: &str) -> bool {
        read(&self.state)
            .refunded
            .iter()
            .any(|id| id == transaction_id)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    #[tracing::instrument(skip(self, method, amount), fields(method = %method, amount = %amount))]
    async fn authorize(
        &self,
        method: &PaymentMethod,
        amount: Money,
    ) -> Result<PaymentResult, ServiceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = write(&self.state);
        state.authorizations += 1;

        if state.unavailable {
            return Err(ServiceError::unavailable(PAYMENT_SERVICE, "gateway unreachable"));
        }
        if state.decline {
            return Err(ServiceError::Declined("card declined".to_string()));
        }
        if amount.is_negative() {
            return Err(ServiceError::Declined(format!("invalid amount {amount}")));
        }

        state.next_id += 1;
        let result = PaymentResult {
            success: true,
            transaction_id: format!("TXN-{}", state.next_id),
            amount,
            method: method.clone(),
        };
        state
            .captured
            .insert(result.transaction_id.clone(), result.clone());

        Ok(result)
    }

    async fn refund(&self, transaction_id: &str) -> Result<(), ServiceError> {
        let mut state = write(&self.state);
        if state.fail_on_refund {
            return Err(ServiceError::unavailable(PAYMENT_SERVICE, "gateway unreachable"));
        }
        if state.captured.remove(transaction_id).is_none() {
            return Err(ServiceError::invalid_response(
                PAYMENT_SERVICE,
                format!("unknown transaction {transaction_id}"),
            ));
        }
        state.refunded.push(transaction_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_and_refund() {
        let gateway = SimulatedPaymentGateway::new();
        let result = gateway
            .authorize(&PaymentMethod::CreditCard, Money::from_cents(5000))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.amount, Money::from_cents(5000));
        assert_eq!(result.method, PaymentMethod::CreditCard);
        assert_eq!(gateway.payment_count(), 1);

        gateway.refund(&result.transaction_id).await.unwrap();
        assert_eq!(gateway.payment_count(), 0);
        assert!(gateway.is_refunded(&result.transaction_id));
    }

    #[tokio::test]
    async fn test_sequential_transaction_ids() {
        let gateway = SimulatedPaymentGateway::new();
        let amount = Money::from_cents(100);

        let first = gateway.authorize(&PaymentMethod::PayPal, amount).await.unwrap();
        let second = gateway.authorize(&PaymentMethod::PayPal, amount).await.unwrap();

        assert_eq!(first.transaction_id, "TXN-1");
        assert_eq!(second.transaction_id, "TXN-2");
    }

    #[tokio::test]
    async fn test_decline() {
        let gateway = SimulatedPaymentGateway::new();
        gateway.set_decline(true);

        let result = gateway
            .authorize(&PaymentMethod::DebitCard, Money::from_cents(100))
            .await;
        assert!(matches!(result, Err(ServiceError::Declined(_))));
        assert_eq!(gateway.payment_count(), 0);
        assert_eq!(gateway.authorization_count(), 1);
    }

    #[tokio::test]
    async fn test_refund_unknown_transaction() {
        let gateway = SimulatedPaymentGateway::new();
        let result = gateway.refund("TXN-404").await;
        assert!(matches!(result, Err(ServiceError::InvalidResponse { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let gateway = SimulatedPaymentGateway::with_latency(Duration::from_secs(1));
        let started = tokio::time::Instant::now();
        gateway
            .authorize(&PaymentMethod::CreditCard, Money::from_cents(1))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
