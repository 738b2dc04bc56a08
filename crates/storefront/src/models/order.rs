//! Order and order item models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use quitanda_core::{
    Money, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, Quantity, UserId,
};

/// An order header row from `storefront.order`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

/// A placed order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Attach items to an order header.
    #[must_use]
    pub fn from_row(row: OrderRow, items: Vec<OrderItem>) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            total: row.total,
            status: row.status,
            payment_method: row.payment_method,
            created_at: row.created_at,
            items,
        }
    }
}

/// One line of an order.
///
/// Name, image and unit price are copies taken at checkout time; later
/// catalog edits never change them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    #[sqlx(try_from = "i32")]
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl OrderItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Order header about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
}

/// Order item about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Money,
}
