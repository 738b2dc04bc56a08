//! Order repository (read side).
//!
//! Orders are written only by the checkout unit of work in
//! [`super::checkout`]; this module serves order history.

use std::collections::HashMap;

use sqlx::PgPool;

use quitanda_core::{OrderId, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderRow};

pub(crate) const ORDER_COLUMNS: &str =
    "id, user_id, total, status, payment_method, created_at";

pub(crate) const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, product_image, quantity, unit_price";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's orders with their items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order"
               WHERE user_id = $1
               ORDER BY created_at DESC, id DESC"#
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let order_ids: Vec<i64> = rows.iter().map(|row| row.id.as_i64()).collect();
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM storefront.order_item
             WHERE order_id = ANY($1)
             ORDER BY id"
        ))
        .bind(&order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                Order::from_row(row, items)
            })
            .collect())
    }

    /// Get one of a user's orders with its items.
    ///
    /// Orders belonging to other users are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order"
               WHERE id = $1 AND user_id = $2"#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM storefront.order_item
             WHERE order_id = $1
             ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(Order::from_row(row, items)))
    }
}
