//! Post-commit side effects: stock decrements and the cart clear.
//!
//! These run in a detached task once the order is committed. Each effect is
//! attempted independently, retried on transient failure, and written to
//! the reconciliation log if it still fails. None of them can undo the
//! order.
//!
//! Running tasks are registered with a [`FulfillmentTracker`] so shutdown
//! can wait for them and log whatever is left unfinished.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::{OrderId, UserId};
use domain::{CartSnapshot, NewReconciliation, StockAdjustment};
use order_store::OrderStore;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::FulfillmentError;
use crate::retry::RetryConfig;
use crate::services::{
    CART_SERVICE, CartService, INVENTORY_SERVICE, InventoryService, with_deadline,
};

/// One side effect of a committed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    DecrementStock(StockAdjustment),
    ClearCart(UserId),
}

impl SideEffect {
    /// Short label used for the `kind` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DecrementStock(_) => "stock_adjustment",
            Self::ClearCart(_) => "cart_clear",
        }
    }
}

/// What happened to one side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectOutcome {
    pub effect: SideEffect,
    /// Attempts made, including the first.
    pub attempts: u32,
    pub result: Result<(), FulfillmentError>,
}

impl SideEffectOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of every side effect of one order, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentReport {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub outcomes: Vec<SideEffectOutcome>,
}

impl FulfillmentReport {
    /// Returns true if every side effect took effect.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(SideEffectOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FulfillmentError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Side effects of one order that have not finished yet.
#[derive(Debug)]
struct InFlight {
    user_id: UserId,
    remaining: Vec<SideEffect>,
    abort: Option<AbortHandle>,
}

/// Side effects abandoned because shutdown did not wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Interrupted {
    pub(crate) order_id: OrderId,
    pub(crate) user_id: UserId,
    pub(crate) effects: Vec<SideEffect>,
}

/// Registry of running fulfillment tasks.
#[derive(Clone, Default)]
pub(crate) struct FulfillmentTracker {
    in_flight: Arc<Mutex<HashMap<OrderId, InFlight>>>,
    idle: Arc<Notify>,
}

impl FulfillmentTracker {
    fn lock(&self) -> MutexGuard<'_, HashMap<OrderId, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, order_id: OrderId, user_id: UserId, effects: &[SideEffect]) {
        self.lock().insert(
            order_id,
            InFlight {
                user_id,
                remaining: effects.to_vec(),
                abort: None,
            },
        );
    }

    fn attach(&self, order_id: OrderId, abort: AbortHandle) {
        if let Some(entry) = self.lock().get_mut(&order_id) {
            entry.abort = Some(abort);
        }
    }

    /// Marks the oldest remaining effect of an order as attempted.
    fn effect_done(&self, order_id: OrderId) {
        if let Some(entry) = self.lock().get_mut(&order_id) {
            if !entry.remaining.is_empty() {
                entry.remaining.remove(0);
            }
        }
    }

    fn finish(&self, order_id: OrderId) {
        let mut in_flight = self.lock();
        in_flight.remove(&order_id);
        if in_flight.is_empty() {
            self.idle.notify_waiters();
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.lock().len()
    }

    /// Waits up to `deadline` for every running task to finish. Tasks still
    /// running afterwards are aborted and their unattempted effects
    /// returned.
    pub(crate) async fn drain(&self, deadline: Duration) -> Vec<Interrupted> {
        let wait_idle = async {
            loop {
                let notified = self.idle.notified();
                let mut notified = std::pin::pin!(notified);
                notified.as_mut().enable();
                if self.lock().is_empty() {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(deadline, wait_idle).await.is_ok() {
            return Vec::new();
        }

        self.lock()
            .drain()
            .map(|(order_id, entry)| {
                if let Some(abort) = entry.abort {
                    abort.abort();
                }
                Interrupted {
                    order_id,
                    user_id: entry.user_id,
                    effects: entry.remaining,
                }
            })
            .collect()
    }
}

/// Reconciliation entry for a side effect that never got a result.
pub(crate) fn interrupted_record(
    order_id: OrderId,
    user_id: UserId,
    effect: SideEffect,
) -> NewReconciliation {
    const DETAIL: &str = "fulfillment interrupted by shutdown before the side effect completed";
    match effect {
        SideEffect::DecrementStock(adjustment) => NewReconciliation::stock_adjustment_failed(
            user_id,
            order_id,
            adjustment.product_id,
            DETAIL,
        ),
        SideEffect::ClearCart(cart_owner) => {
            NewReconciliation::cart_clear_failed(cart_owner, order_id, DETAIL)
        }
    }
}

/// Writes a reconciliation entry, logging instead of failing if the store
/// cannot take it.
pub(crate) async fn record_reconciliation(
    store: &dyn OrderStore,
    timeout: Duration,
    record: NewReconciliation,
) {
    let kind = record.kind;
    let user_id = record.user_id;
    let detail = record.detail.clone();

    match tokio::time::timeout(timeout, store.record_reconciliation(record)).await {
        Ok(Ok(entry)) => {
            metrics::counter!("reconciliation_entries_total", "kind" => kind.as_str())
                .increment(1);
            tracing::debug!(entry_id = entry.id, %kind, "reconciliation entry recorded");
        }
        Ok(Err(e)) => {
            tracing::error!(%kind, %user_id, %detail, error = %e, "failed to record reconciliation entry");
        }
        Err(_) => {
            tracing::error!(%kind, %user_id, %detail, "timed out recording reconciliation entry");
        }
    }
}

/// Runs the side effects of one committed order.
pub(crate) struct Fulfillment {
    pub(crate) cart: Arc<dyn CartService>,
    pub(crate) inventory: Arc<dyn InventoryService>,
    pub(crate) store: Arc<dyn OrderStore>,
    pub(crate) retry: RetryConfig,
    pub(crate) call_timeout: Duration,
    pub(crate) tracker: FulfillmentTracker,
}

impl Fulfillment {
    /// One decrement per cart line in cart order, then the cart clear.
    pub(crate) fn plan(user_id: UserId, cart: &CartSnapshot) -> Vec<SideEffect> {
        cart.lines()
            .iter()
            .map(|line| SideEffect::DecrementStock(StockAdjustment::new(line.product_id, line.quantity)))
            .chain(std::iter::once(SideEffect::ClearCart(user_id)))
            .collect()
    }

    /// Starts the side effects on a detached task. Dropping the handle does
    /// not cancel them.
    pub(crate) fn spawn(
        self,
        order_id: OrderId,
        user_id: UserId,
        effects: Vec<SideEffect>,
    ) -> JoinHandle<FulfillmentReport> {
        let tracker = self.tracker.clone();
        tracker.register(order_id, user_id, &effects);
        let handle = tokio::spawn(self.run(order_id, user_id, effects));
        tracker.attach(order_id, handle.abort_handle());
        handle
    }

    #[tracing::instrument(skip(self, effects), fields(effects = effects.len()))]
    async fn run(
        self,
        order_id: OrderId,
        user_id: UserId,
        effects: Vec<SideEffect>,
    ) -> FulfillmentReport {
        let mut outcomes = Vec::with_capacity(effects.len());
        for effect in effects {
            outcomes.push(self.apply(order_id, user_id, effect).await);
            self.tracker.effect_done(order_id);
        }
        self.tracker.finish(order_id);

        let report = FulfillmentReport {
            order_id,
            user_id,
            outcomes,
        };
        if report.is_clean() {
            tracing::info!("fulfillment completed");
        } else {
            tracing::warn!(
                failures = report.failures().count(),
                "fulfillment completed with failures"
            );
        }
        report
    }

    async fn apply(&self, order_id: OrderId, user_id: UserId, effect: SideEffect) -> SideEffectOutcome {
        let timeout = self.call_timeout;

        let (result, attempts) = match effect {
            SideEffect::DecrementStock(adjustment) => {
                let (result, attempts) = self
                    .retry
                    .run(|| {
                        with_deadline(
                            INVENTORY_SERVICE,
                            timeout,
                            self.inventory.decrement_stock(adjustment),
                        )
                    })
                    .await;
                let result = result.map(|_| ()).map_err(|source| {
                    FulfillmentError::StockAdjustment {
                        product_id: adjustment.product_id,
                        source,
                    }
                });
                (result, attempts)
            }
            SideEffect::ClearCart(cart_owner) => {
                let (result, attempts) = self
                    .retry
                    .run(|| with_deadline(CART_SERVICE, timeout, self.cart.clear_cart(cart_owner)))
                    .await;
                let result = result.map_err(|source| FulfillmentError::CartClear {
                    user_id: cart_owner,
                    source,
                });
                (result, attempts)
            }
        };

        if let Err(err) = &result {
            self.report_failure(order_id, user_id, err, attempts).await;
        }

        SideEffectOutcome {
            effect,
            attempts,
            result,
        }
    }

    async fn report_failure(
        &self,
        order_id: OrderId,
        user_id: UserId,
        err: &FulfillmentError,
        attempts: u32,
    ) {
        metrics::counter!("fulfillment_side_effect_failures_total", "kind" => err.kind())
            .increment(1);

        let record = match err {
            FulfillmentError::StockAdjustment { product_id, source } => {
                tracing::error!(
                    %order_id,
                    %user_id,
                    %product_id,
                    attempts,
                    error = %source,
                    "stock adjustment failed after order commit"
                );
                NewReconciliation::stock_adjustment_failed(
                    user_id,
                    order_id,
                    *product_id,
                    source.to_string(),
                )
            }
            FulfillmentError::CartClear { source, .. } => {
                tracing::error!(
                    %order_id,
                    %user_id,
                    attempts,
                    error = %source,
                    "cart clear failed after order commit"
                );
                NewReconciliation::cart_clear_failed(user_id, order_id, source.to_string())
            }
        };

        record_reconciliation(self.store.as_ref(), self.call_timeout, record).await;
    }
}
