//! Cart line repository.
//!
//! Cart mutations are simple guarded writes; none of them touch stock. The
//! join used by [`CartRepository::entries_for_user`] is the same read the
//! checkout store performs for its snapshot.

use sqlx::{Executor, PgPool, Postgres};

use quitanda_core::{CartLineId, ProductId, Quantity, UserId};

use super::RepositoryError;
use crate::models::{CartEntry, CartLine};

/// Cart lines joined with products, oldest line first.
pub(crate) const CART_ENTRIES_SQL: &str = r"
    SELECT cl.id AS line_id,
           p.id AS product_id,
           p.name AS product_name,
           p.image AS product_image,
           p.price AS unit_price,
           cl.quantity,
           p.stock,
           p.is_available
    FROM storefront.cart_line cl
    JOIN storefront.product p ON p.id = cl.product_id
    WHERE cl.user_id = $1
    ORDER BY cl.id
";

/// Load a user's cart entries with any executor (pool or open transaction).
pub(crate) async fn fetch_entries<'e, E>(
    executor: E,
    user_id: UserId,
) -> Result<Vec<CartEntry>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, CartEntry>(CART_ENTRIES_SQL)
        .bind(user_id)
        .fetch_all(executor)
        .await
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the cart entries for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn entries_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CartEntry>, RepositoryError> {
        Ok(fetch_entries(self.pool, user_id).await?)
    }

    /// Get a single cart line by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_line(&self, id: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        let line = sqlx::query_as::<_, CartLine>(
            r"
            SELECT id, user_id, product_id, quantity
            FROM storefront.cart_line
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(line)
    }

    /// Get the line a user holds for a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let line = sqlx::query_as::<_, CartLine>(
            r"
            SELECT id, user_id, product_id, quantity
            FROM storefront.cart_line
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(line)
    }

    /// Insert a new line, or add to the quantity of the existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the resulting quantity exceeds
    /// the per-line maximum.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        sqlx::query_as::<_, CartLine>(
            r"
            INSERT INTO storefront.cart_line (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = storefront.cart_line.quantity + EXCLUDED.quantity,
                          updated_at = now()
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            // quantity CHECK constraint
            sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
                RepositoryError::Conflict("cart line quantity out of range".to_owned())
            }
            // out-of-range quantity fails to decode back into `Quantity`
            sqlx::Error::ColumnDecode { .. } => {
                RepositoryError::DataCorruption("invalid cart line quantity".to_owned())
            }
            other => RepositoryError::classify(other),
        })
    }

    /// Set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_quantity(
        &self,
        id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        sqlx::query_as::<_, CartLine>(
            r"
            UPDATE storefront.cart_line
            SET quantity = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(id)
        .bind(quantity.as_i32())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn remove(&self, id: CartLineId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_line WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
