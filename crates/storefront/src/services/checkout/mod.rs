//! Checkout transaction processor.
//!
//! Converts a user's cart into a durable order without overselling under
//! concurrent checkouts:
//!
//! 1. Read the cart without locks and price it ([`snapshot`])
//! 2. Open a unit of work and lock every product row the cart touches, in
//!    ascending product id order, re-reading stock under the lock
//! 3. Abort on the first product that is short
//! 4. Write the order and its items from the snapshot ([`materialize`]),
//!    decrement stock, clear the cart, commit
//! 5. Only after the commit, queue the confirmation for delivery
//!
//! Stock is checked after the lock is taken and inside the same unit of work
//! that decrements it, so two checkouts for the last unit of a product can
//! never both pass the check.

pub mod materialize;
pub mod snapshot;
pub mod store;

use thiserror::Error;
use tracing::{info, instrument, warn};

use quitanda_core::{PaymentMethod, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{CurrentUser, Order};
use crate::services::notification::{NotificationQueue, OrderConfirmation};

pub use snapshot::{CartSnapshot, SnapshotLine};
pub use store::{CheckoutStore, UnitOfWork};

/// Errors returned by [`CheckoutService::checkout`].
///
/// None of these leave partial state behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// The payment method label is not one the store accepts.
    #[error("invalid payment method: {0:?}")]
    InvalidPaymentMethod(String),

    /// A product had fewer units in stock than the cart requested.
    #[error("insufficient stock for {product_name} (requested {requested}, available {available})")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: i32,
        available: i32,
    },

    /// The unit of work could not complete; nothing was persisted.
    #[error("checkout transaction failed: {0}")]
    TransactionFailed(#[from] RepositoryError),
}

impl CheckoutError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmptyCart => "empty_cart",
            Self::InvalidPaymentMethod(_) => "invalid_payment_method",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::TransactionFailed(_) => "transaction_failed",
        }
    }
}

/// Places orders against a [`CheckoutStore`].
pub struct CheckoutService<S> {
    store: S,
    notifications: NotificationQueue,
}

impl<S: CheckoutStore> CheckoutService<S> {
    /// Create a checkout service.
    #[must_use]
    pub const fn new(store: S, notifications: NotificationQueue) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Read and price a user's cart without locking anything.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::TransactionFailed` if the cart cannot be read.
    pub async fn preview(&self, user_id: UserId) -> Result<CartSnapshot, CheckoutError> {
        let entries = self.store.load_cart(user_id).await?;
        Ok(CartSnapshot::from_entries(entries))
    }

    /// Turn the customer's current cart into a confirmed order.
    ///
    /// The cart is read live; nothing about it is passed in. On success the
    /// order confirmation is queued for delivery and the created order is
    /// returned with its items.
    ///
    /// # Errors
    ///
    /// - `InvalidPaymentMethod` before anything is read
    /// - `EmptyCart` if the cart has no lines
    /// - `InsufficientStock` naming the first short product, in lock order
    /// - `TransactionFailed` for storage failures, including lock timeouts
    #[instrument(skip(self, customer), fields(user_id = %customer.id))]
    pub async fn checkout(
        &self,
        customer: &CurrentUser,
        payment_method: &str,
    ) -> Result<Order, CheckoutError> {
        let payment_method: PaymentMethod = payment_method
            .parse()
            .map_err(|e: quitanda_core::PaymentMethodError| {
                CheckoutError::InvalidPaymentMethod(e.0)
            })?;

        let snapshot = self.preview(customer.id).await?;
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut unit = self.store.begin().await?;
        let order = match place(&mut unit, customer.id, payment_method, &snapshot).await {
            Ok(order) => order,
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "Checkout rollback failed");
                }
                return Err(e);
            }
        };
        unit.commit().await?;

        info!(
            order_id = %order.id,
            total = %order.total,
            items = order.items.len(),
            payment_method = payment_method.as_str(),
            "Order placed"
        );

        self.notifications
            .enqueue(OrderConfirmation::new(customer, order.clone()));

        Ok(order)
    }
}

/// Everything that happens inside the unit of work, short of committing.
async fn place<U: UnitOfWork>(
    unit: &mut U,
    user_id: UserId,
    payment_method: PaymentMethod,
    snapshot: &CartSnapshot,
) -> Result<Order, CheckoutError> {
    let demand = snapshot.demand();

    for (&product_id, &requested) in &demand {
        let available = unit.lock_and_read_stock(product_id).await?.unwrap_or(0);
        if available < requested {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                product_name: snapshot
                    .product_name(product_id)
                    .unwrap_or_default()
                    .to_owned(),
                requested,
                available,
            });
        }
    }

    let (new_order, new_items) = materialize::order_records(user_id, payment_method, snapshot);
    let row = unit.insert_order(&new_order).await?;
    let items = unit.insert_order_items(row.id, &new_items).await?;

    for (&product_id, &amount) in &demand {
        unit.decrement_stock(product_id, amount).await?;
    }

    // A concurrent checkout by the same user already consumed this cart.
    if unit.clear_cart(user_id).await? == 0 {
        return Err(CheckoutError::EmptyCart);
    }

    Ok(Order::from_row(row, items))
}
