//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Shipping destination captured at checkout.
///
/// Field names follow the storefront's checkout form on the wire
/// (`fullName`, `zipCode`). Missing fields deserialize as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

/// How the customer chose to pay.
///
/// The storefront offers a fixed set of methods, but the gateway is free to
/// accept others, so unknown values are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    PayPal,
    Other(String),
}

impl PaymentMethod {
    /// Returns the wire/column representation of the method.
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::PayPal => "paypal",
            PaymentMethod::Other(method) => method,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "credit_card" => PaymentMethod::CreditCard,
            "debit_card" => PaymentMethod::DebitCard,
            "paypal" => PaymentMethod::PayPal,
            _ => PaymentMethod::Other(s),
        }
    }
}

impl From<&str> for PaymentMethod {
    fn from(s: &str) -> Self {
        PaymentMethod::from(s.to_string())
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Other(method) => method,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
