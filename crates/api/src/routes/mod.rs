//! Route handlers.

pub mod health;
pub mod orders;
pub mod reconciliations;
