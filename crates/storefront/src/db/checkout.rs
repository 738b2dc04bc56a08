//! `PostgreSQL` checkout store.
//!
//! A unit of work is one database transaction. Product rows are locked with
//! `SELECT ... FOR UPDATE`, and `lock_timeout` is set per transaction so a
//! checkout stuck behind another one fails instead of waiting forever.

use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};

use quitanda_core::{OrderId, ProductId, UserId};

use super::RepositoryError;
use super::cart::fetch_entries;
use super::orders::{ORDER_COLUMNS, ORDER_ITEM_COLUMNS};
use crate::models::{CartEntry, NewOrder, NewOrderItem, OrderItem, OrderRow};
use crate::services::checkout::{CheckoutStore, UnitOfWork};

/// Checkout store backed by the storefront database.
#[derive(Debug, Clone)]
pub struct PgCheckoutStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgCheckoutStore {
    /// Create a store that waits at most `lock_timeout` for each row lock.
    #[must_use]
    pub const fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CheckoutStore for PgCheckoutStore {
    type Unit = PgUnitOfWork;

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        fetch_entries(&self.pool, user_id)
            .await
            .map_err(RepositoryError::classify)
    }

    async fn begin(&self) -> Result<PgUnitOfWork, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters.
        let millis = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
            .execute(&mut *tx)
            .await?;

        Ok(PgUnitOfWork { tx })
    }
}

/// Open checkout transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls it back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork for PgUnitOfWork {
    async fn lock_and_read_stock(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT stock FROM storefront.product WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepositoryError::classify)
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            // stock >= 0 CHECK constraint
            sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
                RepositoryError::Conflict("product stock cannot go negative".to_owned())
            }
            other => RepositoryError::classify(other),
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRow, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"INSERT INTO storefront."order" (user_id, total, status, payment_method)
               VALUES ($1, $2, $3, $4)
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(order.user_id)
        .bind(order.total)
        .bind(order.status)
        .bind(order.payment_method)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(RepositoryError::classify)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(&format!(
                "INSERT INTO storefront.order_item
                     (order_id, product_id, product_name, product_image, quantity, unit_price)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {ORDER_ITEM_COLUMNS}"
            ))
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.product_image.as_deref())
            .bind(item.quantity.as_i32())
            .bind(item.unit_price)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(RepositoryError::classify)?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(RepositoryError::classify)?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(RepositoryError::classify)
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await.map_err(RepositoryError::classify)
    }
}
