//! HTTP route handlers for storefront.
//!
//! Every response is JSON. Errors use the body produced by [`AppError`].
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Health check
//! GET    /health/ready         - Readiness check (database)
//!
//! # Products
//! GET    /products             - Products currently on sale
//! GET    /products/{id}        - Product detail
//!
//! # Cart (requires auth)
//! GET    /cart                 - Priced cart snapshot
//! POST   /cart                 - Add a product (merges into an existing line)
//! PATCH  /cart/{line_id}       - Set a line's quantity
//! DELETE /cart/{line_id}       - Remove a line
//!
//! # Checkout (requires auth)
//! GET    /checkout             - Preview: snapshot plus accepted payment methods
//! POST   /checkout             - Place the order
//!
//! # Orders (requires auth)
//! GET    /orders               - Order history
//! GET    /orders/{id}          - Order detail
//! ```
//!
//! [`AppError`]: crate::error::AppError

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{cart_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
///
/// Mutations share one rate limiter; reads are not limited.
pub fn cart_routes() -> Router<AppState> {
    let limiter = cart_rate_limiter();

    Router::new()
        .route(
            "/",
            get(cart::show).merge(post(cart::add).layer(limiter.clone())),
        )
        .route(
            "/{line_id}",
            patch(cart::update)
                .merge(delete(cart::remove))
                .layer(limiter),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(checkout::preview).merge(post(checkout::place).layer(checkout_rate_limiter())),
    )
}

/// Create the order history routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create all storefront routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
}
