//! Core types for Quitanda.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod payment;
pub mod quantity;
pub mod status;

pub use id::*;
pub use money::{Money, MoneyError};
pub use payment::{PaymentMethod, PaymentMethodError};
pub use quantity::{Quantity, QuantityError};
pub use status::OrderStatus;
