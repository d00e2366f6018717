//! Money amounts in minor currency units.

use serde::{Deserialize, Serialize};

/// Money amount represented in minor units (cents, paise) to avoid floating
/// point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Parses a major-unit decimal string such as `"650.00"` or `"12.5"`.
    ///
    /// Postgres `NUMERIC` columns reach us as strings through the cart and
    /// product services. Digits beyond the second decimal place are rounded
    /// half away from zero.
    pub fn parse_major(s: &str) -> Option<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut fraction_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = fraction_digits.next().unwrap_or(0);
        let hundredths = fraction_digits.next().unwrap_or(0);
        let round_up = fraction_digits.next().is_some_and(|d| d >= 5);

        let mut cents = whole.checked_mul(100)?.checked_add(tenths * 10 + hundredths)?;
        if round_up {
            cents = cents.checked_add(1)?;
        }
        Some(Self::from_cents(if negative { -cents } else { cents }))
    }

    /// Converts a major-unit floating point amount, rounding to the nearest
    /// minor unit.
    pub fn from_major_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self::from_cents(cents as i64))
    }

    /// Returns the amount in minor units.
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the major-unit portion (whole number).
    pub const fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the minor-unit remainder.
    pub const fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub const fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        match self.cents.checked_mul(quantity as i64) {
            Some(cents) => Some(Money { cents }),
            None => None,
        }
    }

    /// Adds two amounts, or `None` on overflow.
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.cents.checked_add(other.cents) {
            Some(cents) => Some(Money { cents }),
            None => None,
        }
    }

    /// Sums amounts, or `None` if the total overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.dollars(), self.cents_part())
        }
    }
}
