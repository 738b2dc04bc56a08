//! Integration tests for Quitanda.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory checkout tests
//! cargo test -p quitanda-integration-tests
//!
//! # Including the PostgreSQL tests (needs a migrated database)
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p quitanda-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_atomicity` - Failures at any step leave nothing behind
//! - `checkout_concurrency` - Stock is never oversold under contention
//! - `checkout_snapshots` - Orders keep the prices and names they were placed with
//! - `checkout_postgres` - The same guarantees against a real database

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use quitanda_core::{Money, OrderId, ProductId, Quantity, UserId};
use quitanda_storefront::db::memory::MemoryCheckoutStore;
use quitanda_storefront::models::CurrentUser;
use quitanda_storefront::services::CheckoutService;
use quitanda_storefront::services::notification::{
    LogNotifier, NotificationError, NotificationQueue, OrderConfirmation, OrderNotifier,
    RetryPolicy,
};

/// A logged-in customer with a predictable name and address.
#[must_use]
pub fn customer(id: i64) -> CurrentUser {
    CurrentUser {
        id: UserId::new(id),
        name: format!("Cliente {id}"),
        email: format!("cliente{id}@example.com"),
    }
}

/// Shorthand for a valid quantity.
#[must_use]
pub fn qty(units: i64) -> Quantity {
    Quantity::new(units).unwrap()
}

/// Price in meticais from whole units, e.g. `mt(45)` is 45,00 MT.
#[must_use]
pub fn mt(units: u32) -> Money {
    Money::from_cents(units * 100)
}

/// Retry policy that gives up fast.
#[must_use]
pub const fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(5),
    }
}

/// Checkout service whose confirmations are only logged.
#[must_use]
pub fn service(store: &MemoryCheckoutStore) -> Arc<CheckoutService<MemoryCheckoutStore>> {
    service_with(store, LogNotifier, quick_retry(1))
}

/// Checkout service delivering confirmations through `notifier`.
#[must_use]
pub fn service_with<N: OrderNotifier>(
    store: &MemoryCheckoutStore,
    notifier: N,
    policy: RetryPolicy,
) -> Arc<CheckoutService<MemoryCheckoutStore>> {
    let (queue, _worker) = NotificationQueue::start(notifier, policy, 64);
    Arc::new(CheckoutService::new(store.clone(), queue))
}

/// Notifier that records every delivered order and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<OrderId>>>,
    attempts: Arc<Mutex<u32>>,
    always_fail: bool,
}

impl RecordingNotifier {
    /// Notifier that fails every delivery.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Orders whose confirmation was delivered.
    #[must_use]
    pub fn delivered(&self) -> Vec<OrderId> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivery attempts made so far, successful or not.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until `attempts` deliveries have been tried.
    pub async fn wait_for_attempts(&self, attempts: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.attempts() < attempts {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

impl OrderNotifier for RecordingNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.always_fail {
            return Err(NotificationError::Unavailable("mail relay down".to_string()));
        }
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(confirmation.order.id);
        Ok(())
    }
}

/// Store holding one product with `stock` units at `price`.
#[must_use]
pub fn store_with(name: &str, price: Money, stock: i32) -> (MemoryCheckoutStore, ProductId) {
    let store = MemoryCheckoutStore::new();
    let id = store.insert_product(name, price, stock);
    (store, id)
}
