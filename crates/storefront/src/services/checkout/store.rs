//! Inventory store seam for the checkout transaction.
//!
//! The checkout service is generic over [`CheckoutStore`]. Production uses
//! the `PostgreSQL` implementation in [`crate::db::checkout`]; tests use the
//! in-memory implementation in `crate::db::memory`.
//!
//! A [`UnitOfWork`] is an open atomic transaction. Row locks taken with
//! [`UnitOfWork::lock_and_read_stock`] are held until the unit is committed,
//! rolled back, or dropped. Dropping a unit without committing discards every
//! staged write.

use std::future::Future;

use quitanda_core::{OrderId, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{CartEntry, NewOrder, NewOrderItem, OrderItem, OrderRow};

/// Storage backing the checkout transaction.
pub trait CheckoutStore: Send + Sync {
    /// Open transaction type produced by [`CheckoutStore::begin`].
    type Unit: UnitOfWork;

    /// Read a user's cart joined with product data, without locking.
    fn load_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<CartEntry>, RepositoryError>> + Send;

    /// Open a new unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, RepositoryError>> + Send;
}

/// Operations available inside an open checkout transaction.
pub trait UnitOfWork: Send + Sized {
    /// Lock a product's stock row exclusively and read the current count.
    ///
    /// Returns `None` if the product no longer exists. Blocks while another
    /// unit holds the lock, up to the store's lock timeout, after which
    /// `RepositoryError::LockTimeout` is returned.
    fn lock_and_read_stock(
        &mut self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<i32>, RepositoryError>> + Send;

    /// Reduce a locked product's stock by `amount`.
    fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert the order header.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<OrderRow, RepositoryError>> + Send;

    /// Insert the order items, in the given order.
    fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Vec<OrderItem>, RepositoryError>> + Send;

    /// Delete every cart line of a user, returning how many were removed.
    fn clear_cart(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Make every staged change visible and release the locks.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard every staged change and release the locks.
    fn rollback(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
