//! Domain layer for the order service.
//!
//! This crate provides the data model checkout operates on:
//! - Cart snapshots read from the cart service
//! - Orders, order lines and their status machine
//! - Payment results and stock levels reported by collaborators
//! - Reconciliation entries for inconsistencies that need follow-up

pub mod cart;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod reconciliation;

pub use cart::{CartLine, CartSnapshot};
pub use common::{Money, OrderId, ProductId, UserId};
pub use inventory::{ProductStock, StockAdjustment};
pub use order::{
    NewOrder, NewOrderLine, Order, OrderDetails, OrderError, OrderLine, OrderLineDetails,
    OrderStatus, PaymentMethod, ShippingAddress,
};
pub use payment::PaymentResult;
pub use reconciliation::{NewReconciliation, ReconciliationEntry, ReconciliationKind};
