//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and are decoded with runtime-checked
//! queries; values that carry invariants (quantities, money) are validated on
//! decode through the core types.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;

pub use cart::{CartEntry, CartLine};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderRow};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
