//! Payment method labels.
//!
//! Payments are not processed by the storefront; the method the customer
//! picked is recorded on the order and shown on the confirmation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a payment method label is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported payment method: {0:?}")]
pub struct PaymentMethodError(pub String);

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Debit or credit card.
    Card,
    /// M-Pesa mobile money.
    #[serde(alias = "mobile-money")]
    Mpesa,
}

impl PaymentMethod {
    /// All accepted methods.
    pub const ALL: [Self; 2] = [Self::Card, Self::Mpesa];

    /// Wire label, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Mpesa => "mpesa",
        }
    }

    /// Label shown to customers.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Card => "Cartão",
            Self::Mpesa => "M-Pesa",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "card" => Ok(Self::Card),
            "mpesa" | "mobile-money" => Ok(Self::Mpesa),
            other => Err(PaymentMethodError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_labels() {
        assert_eq!("card".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
        assert_eq!("mpesa".parse::<PaymentMethod>(), Ok(PaymentMethod::Mpesa));
        assert_eq!(
            "mobile-money".parse::<PaymentMethod>(),
            Ok(PaymentMethod::Mpesa)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            "cash".parse::<PaymentMethod>(),
            Err(PaymentMethodError("cash".to_owned()))
        );
        assert!("".parse::<PaymentMethod>().is_err());
        assert!("CARD".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_as_str_roundtrips_through_from_str() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>(), Ok(method));
        }
    }

    #[test]
    fn test_serde_accepts_alias() {
        let parsed: PaymentMethod = serde_json::from_str("\"mobile-money\"").expect("alias");
        assert_eq!(parsed, PaymentMethod::Mpesa);
        let json = serde_json::to_string(&PaymentMethod::Mpesa).expect("serialize");
        assert_eq!(json, "\"mpesa\"");
    }
}
