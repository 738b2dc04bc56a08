//! Integration tests for concurrent checkouts.
//!
//! Checkouts race on real tasks over a multi-threaded runtime; the in-memory
//! store holds per-product row locks exactly as `SELECT ... FOR UPDATE` would.

use std::time::Duration;

use quitanda_core::UserId;
use quitanda_integration_tests::{customer, mt, qty, service, store_with};
use quitanda_storefront::db::RepositoryError;
use quitanda_storefront::db::memory::MemoryCheckoutStore;
use quitanda_storefront::services::CheckoutError;

// =============================================================================
// No Oversell
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_exactly_one_customer() {
    let (store, abacaxi) = store_with("Abacaxi", mt(90), 1);
    store.add_to_cart(UserId::new(1), abacaxi, qty(1));
    store.add_to_cart(UserId::new(2), abacaxi, qty(1));
    let checkout = service(&store);

    let first = tokio::spawn({
        let checkout = checkout.clone();
        async move { checkout.checkout(&customer(1), "card").await }
    });
    let second = tokio::spawn({
        let checkout = checkout.clone();
        async move { checkout.checkout(&customer(2), "mpesa").await }
    });
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        failure,
        CheckoutError::InsufficientStock { product_id, available: 0, .. } if *product_id == abacaxi
    ));
    assert_eq!(store.stock(abacaxi), Some(0));
    assert_eq!(store.orders().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_customers_never_oversell() {
    const CUSTOMERS: i64 = 25;
    const STOCK: i32 = 7;

    let (store, cereja) = store_with("Cereja", mt(180), STOCK);
    for user in 1..=CUSTOMERS {
        store.add_to_cart(UserId::new(user), cereja, qty(1));
    }
    let checkout = service(&store);

    let tasks: Vec<_> = (1..=CUSTOMERS)
        .map(|user| {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.checkout(&customer(user), "card").await })
        })
        .collect();

    let mut placed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, STOCK);
    assert_eq!(store.stock(cereja), Some(0));
    assert_eq!(store.orders().len(), usize::try_from(STOCK).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_carts_do_not_deadlock() {
    let store = MemoryCheckoutStore::new();
    let uva = store.insert_product("Uva", mt(150), 100);
    let kiwi = store.insert_product("Kiwi", mt(100), 100);
    // Same products, added in opposite orders.
    store.add_to_cart(UserId::new(1), uva, qty(1));
    store.add_to_cart(UserId::new(1), kiwi, qty(1));
    store.add_to_cart(UserId::new(2), kiwi, qty(2));
    store.add_to_cart(UserId::new(2), uva, qty(2));
    let checkout = service(&store);

    let tasks: Vec<_> = [1, 2]
        .into_iter()
        .map(|user| {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.checkout(&customer(user), "card").await })
        })
        .collect();

    for task in tasks {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
    assert_eq!(store.stock(uva), Some(97));
    assert_eq!(store.stock(kiwi), Some(97));
}

// =============================================================================
// Lock Scope
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disjoint_products_proceed_while_another_is_locked() {
    let store = MemoryCheckoutStore::new();
    let coco = store.insert_product("Coco", mt(85), 35);
    let limao = store.insert_product("Limão", mt(30), 150);
    store.add_to_cart(UserId::new(1), limao, qty(4));
    let checkout = service(&store);

    let _held = store.lock_product(coco).await;

    let order = tokio::time::timeout(
        Duration::from_secs(1),
        checkout.checkout(&customer(1), "card"),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(order.total, mt(120));
    assert_eq!(store.stock(limao), Some(146));
}

#[tokio::test]
async fn test_lock_timeout_fails_transaction() {
    let store = MemoryCheckoutStore::with_lock_timeout(Duration::from_millis(50));
    let coco = store.insert_product("Coco", mt(85), 35);
    store.add_to_cart(UserId::new(1), coco, qty(1));
    let checkout = service(&store);

    let held = store.lock_product(coco).await;
    let err = checkout.checkout(&customer(1), "card").await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::TransactionFailed(RepositoryError::LockTimeout)
    ));
    assert_eq!(store.stock(coco), Some(35));
    assert_eq!(store.cart_len(UserId::new(1)), 1);

    drop(held);
    checkout.checkout(&customer(1), "card").await.unwrap();
    assert_eq!(store.stock(coco), Some(34));
}

// =============================================================================
// Same Customer
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_submit_places_one_order() {
    let (store, melao) = store_with("Melão", mt(75), 40);
    store.add_to_cart(UserId::new(1), melao, qty(2));
    let checkout = service(&store);

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.checkout(&customer(1), "card").await })
        })
        .collect();

    let mut placed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::EmptyCart) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(store.orders().len(), 1);
    assert_eq!(store.stock(melao), Some(38));
}
