//! In-memory checkout store for tests.
//!
//! Mirrors the locking behaviour of [`super::checkout::PgCheckoutStore`]:
//! every product has its own row lock, held by a unit of work until it
//! commits, rolls back or is dropped, and acquisition gives up after the
//! configured lock timeout. Writes are staged on the unit and applied in one
//! step at commit, so an abandoned unit leaves nothing behind.
//!
//! Failures can be injected at any step with [`MemoryCheckoutStore::fail_at`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use quitanda_core::{
    CartLineId, Money, OrderId, OrderItemId, ProductId, Quantity, UserId,
};

use super::RepositoryError;
use crate::models::{CartEntry, CartLine, NewOrder, NewOrderItem, Order, OrderItem, OrderRow};
use crate::services::checkout::{CheckoutStore, UnitOfWork};

/// Step at which the next checkout should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    LoadCart,
    Begin,
    LockStock,
    InsertOrder,
    InsertOrderItems,
    DecrementStock,
    ClearCart,
    Commit,
}

#[derive(Debug, Clone)]
struct ProductRow {
    name: String,
    price: Money,
    stock: i32,
    image: Option<String>,
    is_available: bool,
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, ProductRow>,
    cart: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, OrderRow>,
    order_items: Vec<OrderItem>,
    next_id: i64,
    fail_at: Option<FailAt>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_failure(&mut self, at: FailAt) -> Result<(), RepositoryError> {
        if self.fail_at == Some(at) {
            self.fail_at = None;
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<ProductId, Arc<RowLock<()>>>>,
    lock_timeout: Duration,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, product_id: ProductId) -> Arc<RowLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(product_id).or_default())
    }
}

/// Checkout store backed by process memory.
#[derive(Debug, Clone)]
pub struct MemoryCheckoutStore {
    inner: Arc<Inner>,
}

impl Default for MemoryCheckoutStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCheckoutStore {
    /// Empty store with a five second lock timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(5))
    }

    /// Empty store with the given lock timeout.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }

    /// Add an available product to the catalog.
    pub fn insert_product(&self, name: &str, price: Money, stock: i32) -> ProductId {
        let mut state = self.inner.state();
        let id = ProductId::new(state.next_id());
        state.products.insert(
            id,
            ProductRow {
                name: name.to_owned(),
                price,
                stock,
                image: None,
                is_available: true,
            },
        );
        id
    }

    /// Edit a product's catalog fields.
    pub fn update_product(
        &self,
        id: ProductId,
        name: &str,
        price: Money,
        image: Option<&str>,
    ) {
        if let Some(product) = self.inner.state().products.get_mut(&id) {
            product.name = name.to_owned();
            product.price = price;
            product.image = image.map(str::to_owned);
        }
    }

    /// Withdraw a product from sale without removing it.
    pub fn set_available(&self, id: ProductId, is_available: bool) {
        if let Some(product) = self.inner.state().products.get_mut(&id) {
            product.is_available = is_available;
        }
    }

    /// Add units to a user's cart, merging with an existing line.
    pub fn add_to_cart(&self, user_id: UserId, product_id: ProductId, quantity: Quantity) {
        let mut state = self.inner.state();
        if let Some(line) = state
            .cart
            .values_mut()
            .find(|line| line.user_id == user_id && line.product_id == product_id)
        {
            if let Ok(merged) = line.quantity.checked_add(quantity) {
                line.quantity = merged;
            }
            return;
        }
        let id = CartLineId::new(state.next_id());
        state.cart.insert(
            id,
            CartLine {
                id,
                user_id,
                product_id,
                quantity,
            },
        );
    }

    /// Current committed stock of a product.
    #[must_use]
    pub fn stock(&self, id: ProductId) -> Option<i32> {
        self.inner.state().products.get(&id).map(|p| p.stock)
    }

    /// Number of cart lines a user holds.
    #[must_use]
    pub fn cart_len(&self, user_id: UserId) -> usize {
        self.inner
            .state()
            .cart
            .values()
            .filter(|line| line.user_id == user_id)
            .count()
    }

    /// Every committed order with its items, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        let state = self.inner.state();
        state
            .orders
            .values()
            .map(|row| {
                let items = state
                    .order_items
                    .iter()
                    .filter(|item| item.order_id == row.id)
                    .cloned()
                    .collect();
                Order::from_row(row.clone(), items)
            })
            .collect()
    }

    /// Make the next operation of the given kind fail.
    pub fn fail_at(&self, at: FailAt) {
        self.inner.state().fail_at = Some(at);
    }

    /// Hold a product's row lock from outside any unit of work.
    pub async fn lock_product(&self, id: ProductId) -> OwnedMutexGuard<()> {
        self.inner.row_lock(id).lock_owned().await
    }
}

impl CheckoutStore for MemoryCheckoutStore {
    type Unit = MemoryUnitOfWork;

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let mut state = self.inner.state();
        state.take_failure(FailAt::LoadCart)?;

        Ok(state
            .cart
            .values()
            .filter(|line| line.user_id == user_id)
            .filter_map(|line| {
                let product = state.products.get(&line.product_id)?;
                Some(CartEntry {
                    line_id: line.id,
                    product_id: line.product_id,
                    product_name: product.name.clone(),
                    product_image: product.image.clone(),
                    unit_price: product.price,
                    quantity: line.quantity,
                    stock: product.stock,
                    is_available: product.is_available,
                })
            })
            .collect())
    }

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepositoryError> {
        self.inner.state().take_failure(FailAt::Begin)?;
        Ok(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            guards: Vec::new(),
            decrements: Vec::new(),
            order: None,
            items: Vec::new(),
            clear_cart_for: None,
        })
    }
}

/// Open in-memory transaction.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    decrements: Vec<(ProductId, i32)>,
    order: Option<OrderRow>,
    items: Vec<OrderItem>,
    clear_cart_for: Option<UserId>,
}

impl MemoryUnitOfWork {
    fn pending_decrement(&self, product_id: ProductId) -> i32 {
        self.decrements
            .iter()
            .filter(|(id, _)| *id == product_id)
            .map(|(_, amount)| amount)
            .sum()
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_and_read_stock(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        self.inner.state().take_failure(FailAt::LockStock)?;

        let row_lock = self.inner.row_lock(product_id);
        let guard = tokio::time::timeout(self.inner.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| RepositoryError::LockTimeout)?;
        self.guards.push(guard);

        let stock = self
            .inner
            .state()
            .products
            .get(&product_id)
            .map(|p| p.stock - self.pending_decrement(product_id));

        // Let contending units reach the lock while this one holds it.
        tokio::task::yield_now().await;
        Ok(stock)
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        amount: i32,
    ) -> Result<(), RepositoryError> {
        let stock = {
            let mut state = self.inner.state();
            state.take_failure(FailAt::DecrementStock)?;
            state
                .products
                .get(&product_id)
                .map(|p| p.stock)
                .ok_or(RepositoryError::NotFound)?
        };
        if stock - self.pending_decrement(product_id) - amount < 0 {
            return Err(RepositoryError::Conflict(
                "product stock cannot go negative".to_owned(),
            ));
        }
        self.decrements.push((product_id, amount));
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderRow, RepositoryError> {
        let id = {
            let mut state = self.inner.state();
            state.take_failure(FailAt::InsertOrder)?;
            OrderId::new(state.next_id())
        };
        let row = OrderRow {
            id,
            user_id: order.user_id,
            total: order.total,
            status: order.status,
            payment_method: order.payment_method,
            created_at: Utc::now(),
        };
        self.order = Some(row.clone());
        Ok(row)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let inserted: Vec<OrderItem> = {
            let mut state = self.inner.state();
            state.take_failure(FailAt::InsertOrderItems)?;
            items
                .iter()
                .map(|item| OrderItem {
                    id: OrderItemId::new(state.next_id()),
                    order_id,
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    product_image: item.product_image.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect()
        };
        self.items.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut state = self.inner.state();
        state.take_failure(FailAt::ClearCart)?;
        let count = state
            .cart
            .values()
            .filter(|line| line.user_id == user_id)
            .count();
        drop(state);

        self.clear_cart_for = Some(user_id);
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let mut state = self.inner.state();
        state.take_failure(FailAt::Commit)?;

        for (product_id, amount) in &self.decrements {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= amount;
            }
        }
        if let Some(order) = self.order {
            state.orders.insert(order.id, order);
        }
        state.order_items.extend(self.items);
        if let Some(user_id) = self.clear_cart_for {
            state.cart.retain(|_, line| line.user_id != user_id);
        }
        drop(state);

        // Row locks release when the guards drop.
        drop(self.guards);
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staged_writes_are_invisible_until_commit() {
        let store = MemoryCheckoutStore::new();
        let p = store.insert_product("Banana", Money::from_cents(4500), 10);

        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.lock_and_read_stock(p).await.unwrap(), Some(10));
        unit.decrement_stock(p, 4).await.unwrap();
        assert_eq!(store.stock(p), Some(10));

        unit.commit().await.unwrap();
        assert_eq!(store.stock(p), Some(6));
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_writes_and_releases_lock() {
        let store = MemoryCheckoutStore::with_lock_timeout(Duration::from_millis(50));
        let p = store.insert_product("Banana", Money::from_cents(4500), 10);

        let mut unit = store.begin().await.unwrap();
        unit.lock_and_read_stock(p).await.unwrap();
        unit.decrement_stock(p, 4).await.unwrap();
        drop(unit);

        let mut next = store.begin().await.unwrap();
        assert_eq!(next.lock_and_read_stock(p).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let store = MemoryCheckoutStore::with_lock_timeout(Duration::from_millis(20));
        let p = store.insert_product("Banana", Money::from_cents(4500), 10);
        let _held = store.lock_product(p).await;

        let mut unit = store.begin().await.unwrap();
        let err = unit.lock_and_read_stock(p).await.unwrap_err();
        assert!(matches!(err, RepositoryError::LockTimeout));
    }

    #[tokio::test]
    async fn test_decrement_below_zero_is_rejected() {
        let store = MemoryCheckoutStore::new();
        let p = store.insert_product("Banana", Money::from_cents(4500), 2);

        let mut unit = store.begin().await.unwrap();
        unit.lock_and_read_stock(p).await.unwrap();
        let err = unit.decrement_stock(p, 3).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_product_reads_as_none() {
        let store = MemoryCheckoutStore::new();
        let mut unit = store.begin().await.unwrap();
        assert_eq!(
            unit.lock_and_read_stock(ProductId::new(999)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryCheckoutStore::new();
        store.fail_at(FailAt::Begin);
        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_ok());
    }
}
