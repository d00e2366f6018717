//! Checkout coordinator: turns a cart into a committed order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::UserId;
use domain::{CartSnapshot, NewOrder, NewReconciliation, Order, PaymentMethod, PaymentResult, ShippingAddress};
use order_store::OrderStore;
use tokio::task::JoinHandle;

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::fulfillment::{
    Fulfillment, FulfillmentReport, FulfillmentTracker, interrupted_record, record_reconciliation,
};
use crate::saga::CheckoutSaga;
use crate::services::{
    CART_SERVICE, CartService, INVENTORY_SERVICE, InventoryService, PAYMENT_SERVICE,
    PaymentGateway, with_deadline,
};
use crate::steps;

/// Message returned with every placed order.
pub const ORDER_PLACED_MESSAGE: &str = "Order placed successfully";

/// A committed order plus a handle on its background fulfillment.
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    pub message: &'static str,
    /// Resolves once every stock decrement and the cart clear were
    /// attempted. Dropping it leaves the work running.
    pub fulfillment: JoinHandle<FulfillmentReport>,
}

/// Orchestrates the checkout saga.
///
/// Steps run strictly in order: read cart, check stock, authorize payment,
/// record order, submit fulfillment. Only the payment has a compensating
/// action (refund), applied when the order cannot be recorded.
#[derive(Clone)]
pub struct CheckoutCoordinator {
    cart: Arc<dyn CartService>,
    payment: Arc<dyn PaymentGateway>,
    inventory: Arc<dyn InventoryService>,
    store: Arc<dyn OrderStore>,
    config: CheckoutConfig,
    fulfillment: FulfillmentTracker,
}

impl CheckoutCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        cart: Arc<dyn CartService>,
        payment: Arc<dyn PaymentGateway>,
        inventory: Arc<dyn InventoryService>,
        store: Arc<dyn OrderStore>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            cart,
            payment,
            inventory,
            store,
            config,
            fulfillment: FulfillmentTracker::default(),
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Number of orders whose side effects are still running.
    pub fn fulfillment_in_flight(&self) -> usize {
        self.fulfillment.in_flight()
    }

    /// Waits up to `deadline` for background fulfillment to finish.
    ///
    /// Called on shutdown. Side effects that are still pending when the
    /// deadline passes are cancelled and written to the reconciliation log.
    /// Returns how many side effects were cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn drain_fulfillment(&self, deadline: Duration) -> usize {
        let interrupted = self.fulfillment.drain(deadline).await;

        let mut cancelled = 0;
        for task in interrupted {
            for effect in task.effects {
                metrics::counter!("fulfillment_side_effect_failures_total", "kind" => effect.kind())
                    .increment(1);
                tracing::error!(
                    order_id = %task.order_id,
                    user_id = %task.user_id,
                    ?effect,
                    "side effect cancelled by shutdown"
                );
                let record = interrupted_record(task.order_id, task.user_id, effect);
                record_reconciliation(self.store.as_ref(), self.config.call_timeout, record).await;
                cancelled += 1;
            }
        }

        if cancelled == 0 {
            tracing::info!("background fulfillment drained");
        }
        cancelled
    }

    /// Places an order for everything in the user's cart.
    ///
    /// Returns once the order is committed. Stock decrements and the cart
    /// clear continue in the background and never turn a placed order into
    /// an error.
    #[tracing::instrument(skip(self, shipping_address, payment_method), fields(%user_id, %payment_method))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<PlacedOrder, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let mut saga = CheckoutSaga::start(user_id);
        let result = self
            .run(&mut saga, shipping_address, payment_method)
            .await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(placed) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total_amount,
                    payment_reference = %placed.order.payment_reference,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(
                    reason = e.reason(),
                    state = %saga.state(),
                    completed_steps = ?saga.completed_steps(),
                    error = %e,
                    "checkout failed"
                );
            }
        }
        result
    }

    async fn run(
        &self,
        saga: &mut CheckoutSaga,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<PlacedOrder, CheckoutError> {
        let user_id = saga.user_id();
        let timeout = self.config.call_timeout;

        // 1. Read the cart
        saga.step_started(steps::STEP_READ_CART);
        let cart = match with_deadline(CART_SERVICE, timeout, self.cart.get_cart(user_id)).await {
            Ok(cart) => cart,
            Err(e) => return Err(abort(saga, CheckoutError::CartUnavailable(e))),
        };
        if cart.is_empty() {
            return Err(abort(saga, CheckoutError::EmptyCart { user_id }));
        }
        // The payment reference is filled in once payment succeeds.
        let mut new_order =
            match NewOrder::from_cart(user_id, &cart, shipping_address, payment_method, "") {
                Ok(order) => order,
                Err(e) => return Err(abort(saga, e.into())),
            };
        saga.step_completed(steps::STEP_READ_CART);

        // 2. Pre-check stock before charging
        saga.step_started(steps::STEP_CHECK_STOCK);
        if let Err(e) = self.check_stock(&cart).await {
            return Err(abort(saga, e));
        }
        saga.step_completed(steps::STEP_CHECK_STOCK);

        // 3. Authorize payment
        saga.step_started(steps::STEP_AUTHORIZE_PAYMENT);
        let authorization = with_deadline(
            PAYMENT_SERVICE,
            timeout,
            self.payment
                .authorize(&new_order.payment_method, new_order.total_amount),
        )
        .await;
        let payment = match authorization {
            Ok(payment) if payment.success => payment,
            Ok(payment) => {
                let reason = format!("transaction {} was not approved", payment.transaction_id);
                return Err(abort(saga, CheckoutError::PaymentFailed(reason)));
            }
            Err(e) => return Err(abort(saga, CheckoutError::PaymentFailed(e.to_string()))),
        };
        new_order.payment_reference = payment.transaction_id.clone();
        saga.payment_captured(steps::STEP_AUTHORIZE_PAYMENT, payment.clone());

        // 4. Record the order and its lines atomically
        saga.step_started(steps::STEP_RECORD_ORDER);
        let order = match tokio::time::timeout(timeout, self.store.insert_order(new_order)).await {
            Ok(Ok(order)) => order,
            Ok(Err(e)) => return Err(self.compensate(saga, &payment, e.to_string()).await),
            Err(_) => {
                let reason = format!("order store timed out after {timeout:?}");
                return Err(self.compensate(saga, &payment, reason).await);
            }
        };
        saga.order_recorded(steps::STEP_RECORD_ORDER, order.id);

        // 5. Hand the side effects to a background task
        saga.step_started(steps::STEP_SUBMIT_FULFILLMENT);
        let fulfillment = Fulfillment {
            cart: self.cart.clone(),
            inventory: self.inventory.clone(),
            store: self.store.clone(),
            retry: self.config.fulfillment_retry.clone(),
            call_timeout: timeout,
            tracker: self.fulfillment.clone(),
        }
        .spawn(order.id, user_id, Fulfillment::plan(user_id, &cart));
        saga.step_completed(steps::STEP_SUBMIT_FULFILLMENT);

        Ok(PlacedOrder {
            order,
            message: ORDER_PLACED_MESSAGE,
            fulfillment,
        })
    }

    /// Fails with `InsufficientStock` if any line asks for more than the
    /// product's known stock. Unknown products pass, and an unreachable
    /// inventory skips the check; the post-commit decrement stays the
    /// authority.
    async fn check_stock(&self, cart: &CartSnapshot) -> Result<(), CheckoutError> {
        let timeout = self.config.call_timeout;

        for line in cart.lines() {
            let level = with_deadline(
                INVENTORY_SERVICE,
                timeout,
                self.inventory.stock_level(line.product_id),
            )
            .await;

            match level {
                Ok(Some(available)) if available < line.quantity => {
                    return Err(CheckoutError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(product_id = %line.product_id, error = %e, "stock pre-check skipped");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Undoes completed steps in reverse order after the order could not be
    /// recorded, then writes the captured payment to the reconciliation log.
    async fn compensate(
        &self,
        saga: &mut CheckoutSaga,
        payment: &PaymentResult,
        reason: String,
    ) -> CheckoutError {
        saga.step_failed(reason.clone());

        let mut refunded = false;
        if saga.begin_compensation() {
            let completed: Vec<&'static str> =
                saga.completed_steps().iter().rev().copied().collect();
            for step in completed {
                if step == steps::STEP_AUTHORIZE_PAYMENT {
                    refunded = self.refund(payment).await;
                }
            }
        }

        tracing::error!(
            user_id = %saga.user_id(),
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            refunded,
            %reason,
            "payment captured but order not recorded"
        );
        record_reconciliation(
            self.store.as_ref(),
            self.config.call_timeout,
            NewReconciliation::payment_without_order(saga.user_id(), payment, refunded, &reason),
        )
        .await;
        saga.fail();

        CheckoutError::OrderPersistence {
            transaction_id: payment.transaction_id.clone(),
            refunded,
            reason,
        }
    }

    async fn refund(&self, payment: &PaymentResult) -> bool {
        let result = with_deadline(
            PAYMENT_SERVICE,
            self.config.call_timeout,
            self.payment.refund(&payment.transaction_id),
        )
        .await;

        match result {
            Ok(()) => {
                metrics::counter!("payment_refunds_total").increment(1);
                tracing::info!(transaction_id = %payment.transaction_id, "payment refunded");
                true
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %payment.transaction_id,
                    error = %e,
                    "refund failed"
                );
                false
            }
        }
    }
}

fn abort(saga: &mut CheckoutSaga, err: CheckoutError) -> CheckoutError {
    saga.step_failed(err.to_string());
    saga.fail();
    err
}
