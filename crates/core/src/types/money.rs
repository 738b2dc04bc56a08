//! Monetary amounts in meticais.
//!
//! The storefront sells in a single currency (Mozambican metical, `MZN`), so
//! `Money` is a thin wrapper around a non-negative [`Decimal`] with two
//! fractional digits. Amounts are displayed the way receipts print them:
//! `1.234,50 MT`.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::quantity::Quantity;

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative amount of money.
///
/// ## Examples
///
/// ```
/// use quitanda_core::{Money, Quantity};
/// use rust_decimal::Decimal;
///
/// let price = Money::new(Decimal::new(4500, 2)).unwrap();
/// let quantity = Quantity::new(2).unwrap();
/// assert_eq!(price.times(quantity).amount(), Decimal::new(9000, 2));
/// assert_eq!(price.times(quantity).to_string(), "90,00 MT");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// ISO 4217 code of the store currency.
    pub const CURRENCY_CODE: &'static str = "MZN";

    /// Suffix used when displaying amounts.
    pub const SYMBOL: &'static str = "MT";

    /// Zero meticais.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding to cents.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// Create an amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Self {
        Self(self.0 * Decimal::from(quantity.get()))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = format!("{:.2}", self.0);
        let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, digit) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(*digit);
        }

        write!(f, "{grouped},{cents} {}", Self::SYMBOL)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mt(cents: u32) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(
            Money::new(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(_))
        ));
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_rounds_to_cents() {
        let money = Money::new(Decimal::new(12_345, 3)).unwrap();
        assert_eq!(money.amount(), Decimal::new(1234, 2));
    }

    #[test]
    fn test_times_quantity() {
        let total = mt(4500).times(Quantity::new(2).unwrap());
        assert_eq!(total, mt(9000));
    }

    #[test]
    fn test_sum() {
        let total: Money = [mt(4500), mt(6000), mt(3550)].into_iter().sum();
        assert_eq!(total, mt(14_050));
        let empty: Money = std::iter::empty().sum();
        assert_eq!(empty, Money::ZERO);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(mt(0).to_string(), "0,00 MT");
        assert_eq!(mt(4500).to_string(), "45,00 MT");
        assert_eq!(mt(123_450).to_string(), "1.234,50 MT");
        assert_eq!(mt(123_456_789).to_string(), "1.234.567,89 MT");
    }

    #[test]
    fn test_serializes_as_string_decimal() {
        let json = serde_json::to_string(&mt(9000)).unwrap();
        assert_eq!(json, "\"90.00\"");
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, mt(9000));
    }
}
