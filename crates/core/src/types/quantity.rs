//! Line-item quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity below the minimum.
    #[error("quantity must be at least {min}")]
    TooSmall {
        /// Minimum allowed quantity.
        min: u16,
    },
    /// Quantity above the maximum.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u16,
    },
}

/// Number of units of one product on a cart line or order item.
///
/// ## Constraints
///
/// - Minimum: 1
/// - Maximum: 999
///
/// ## Examples
///
/// ```
/// use quitanda_core::Quantity;
///
/// assert!(Quantity::new(1).is_ok());
/// assert!(Quantity::new(999).is_ok());
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(1000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u16);

impl Quantity {
    /// Smallest quantity a line can hold.
    pub const MIN: u16 = 1;

    /// Largest quantity a line can hold.
    pub const MAX: u16 = 999;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Validate a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is outside `1..=999`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < i64::from(Self::MIN) {
            return Err(QuantityError::TooSmall { min: Self::MIN });
        }
        if value > i64::from(Self::MAX) {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        u16::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge { max: Self::MAX })
    }

    /// Number of units.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Number of units as stored in the database.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        i32::from(self.0)
    }

    /// Add `other` units, staying within bounds.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::TooLarge`] if the sum exceeds the maximum.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        Self::from(quantity.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::TooSmall { min: 1 }));
        assert_eq!(Quantity::new(-3), Err(QuantityError::TooSmall { min: 1 }));
        assert_eq!(Quantity::new(1000), Err(QuantityError::TooLarge { max: 999 }));
        assert_eq!(Quantity::new(999).unwrap().get(), 999);
    }

    #[test]
    fn test_checked_add() {
        let a = Quantity::new(500).unwrap();
        let b = Quantity::new(499).unwrap();
        assert_eq!(a.checked_add(b).unwrap().get(), 999);
        assert!(a.checked_add(a).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Quantity = serde_json::from_str("3").unwrap();
        assert_eq!(ok.as_i32(), 3);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("1000").is_err());
    }
}
