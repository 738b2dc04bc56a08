//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Cart-to-order transaction with row-locked stock reservation
//! - `notification` - Post-commit order confirmation delivery

pub mod checkout;
pub mod notification;

pub use checkout::{CheckoutError, CheckoutService};
pub use notification::{NotificationQueue, OrderNotifier};
