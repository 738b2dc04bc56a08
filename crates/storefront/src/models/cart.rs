//! Cart line rows.

use serde::Serialize;

use quitanda_core::{CartLineId, Money, ProductId, Quantity, UserId};

/// One row of `storefront.cart_line`.
///
/// There is at most one line per (user, product) pair.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    #[sqlx(try_from = "i32")]
    pub quantity: Quantity,
}

/// A cart line joined with the product it refers to.
///
/// Product fields are read without locks; they are a point-in-time view that
/// the checkout transaction re-verifies (for stock) under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartEntry {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    #[sqlx(try_from = "i32")]
    pub quantity: Quantity,
    pub stock: i32,
    pub is_available: bool,
}
