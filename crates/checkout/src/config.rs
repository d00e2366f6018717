//! Checkout tuning knobs.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Settings shared by every checkout the coordinator runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutConfig {
    /// Deadline for each individual collaborator call.
    pub call_timeout: Duration,
    /// Backoff for post-commit stock decrements and cart clears.
    pub fulfillment_retry: RetryConfig,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            fulfillment_retry: RetryConfig::default(),
        }
    }
}
