use serde::{Deserialize, Serialize};

/// Declares a database-assigned integer identifier.
///
/// The product, cart and order services all key their rows by `SERIAL`
/// columns, so every identifier wraps an `i64` and serializes as a bare
/// number.
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier value.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw identifier value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id!(
    /// Identifier of the customer placing orders.
    UserId
);

integer_id!(
    /// Identifier of a product in the catalog.
    ProductId
);

integer_id!(
    /// Identifier assigned by the order store when an order is committed.
    OrderId
);
