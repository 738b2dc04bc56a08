//! Integration tests for checkout atomicity.
//!
//! A checkout that fails at any step must leave stock, the cart and the
//! order table exactly as they were.

use quitanda_integration_tests::{customer, mt, qty, service};
use quitanda_storefront::db::memory::{FailAt, MemoryCheckoutStore};
use quitanda_storefront::services::CheckoutError;

use quitanda_core::UserId;

// =============================================================================
// Injected Failures
// =============================================================================

const ALL_STEPS: [FailAt; 8] = [
    FailAt::LoadCart,
    FailAt::Begin,
    FailAt::LockStock,
    FailAt::InsertOrder,
    FailAt::InsertOrderItems,
    FailAt::DecrementStock,
    FailAt::ClearCart,
    FailAt::Commit,
];

#[tokio::test]
async fn test_failure_at_any_step_persists_nothing() {
    for step in ALL_STEPS {
        let store = MemoryCheckoutStore::new();
        let banana = store.insert_product("Banana", mt(45), 100);
        let manga = store.insert_product("Manga", mt(80), 50);
        store.add_to_cart(UserId::new(1), banana, qty(2));
        store.add_to_cart(UserId::new(1), manga, qty(1));
        let checkout = service(&store);

        store.fail_at(step);
        let err = checkout.checkout(&customer(1), "card").await.unwrap_err();

        assert!(
            matches!(err, CheckoutError::TransactionFailed(_)),
            "{step:?}: unexpected {err:?}"
        );
        assert_eq!(store.stock(banana), Some(100), "{step:?}");
        assert_eq!(store.stock(manga), Some(50), "{step:?}");
        assert_eq!(store.cart_len(UserId::new(1)), 2, "{step:?}");
        assert!(store.orders().is_empty(), "{step:?}");

        // Injected failures are one-shot; the same cart goes through afterwards.
        let order = checkout.checkout(&customer(1), "card").await.unwrap();
        assert_eq!(order.items.len(), 2, "{step:?}");
        assert_eq!(store.stock(banana), Some(98), "{step:?}");
        assert_eq!(store.stock(manga), Some(49), "{step:?}");
    }
}

// =============================================================================
// Rejected Checkouts
// =============================================================================

#[tokio::test]
async fn test_short_second_product_releases_first() {
    let store = MemoryCheckoutStore::new();
    let banana = store.insert_product("Banana", mt(45), 100);
    let laranja = store.insert_product("Laranja", mt(35), 3);
    store.add_to_cart(UserId::new(1), banana, qty(10));
    store.add_to_cart(UserId::new(1), laranja, qty(5));
    let checkout = service(&store);

    let err = checkout.checkout(&customer(1), "mpesa").await.unwrap_err();

    match err {
        CheckoutError::InsufficientStock {
            product_id,
            requested,
            available,
            ..
        } => {
            assert_eq!(product_id, laranja);
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(store.stock(banana), Some(100));
    assert_eq!(store.stock(laranja), Some(3));
    assert_eq!(store.cart_len(UserId::new(1)), 2);
    assert!(store.orders().is_empty());

    // Row locks were released: another customer can buy the first product.
    store.add_to_cart(UserId::new(2), banana, qty(1));
    checkout.checkout(&customer(2), "card").await.unwrap();
    assert_eq!(store.stock(banana), Some(99));
}

#[tokio::test]
async fn test_invalid_payment_method_touches_nothing() {
    let store = MemoryCheckoutStore::new();
    let banana = store.insert_product("Banana", mt(45), 100);
    store.add_to_cart(UserId::new(1), banana, qty(1));
    // Would fail if the cart were read.
    store.fail_at(FailAt::LoadCart);
    let checkout = service(&store);

    let err = checkout.checkout(&customer(1), "cash").await.unwrap_err();

    assert!(matches!(err, CheckoutError::InvalidPaymentMethod(ref m) if m == "cash"));
    assert_eq!(store.stock(banana), Some(100));
    assert_eq!(store.cart_len(UserId::new(1)), 1);
}
