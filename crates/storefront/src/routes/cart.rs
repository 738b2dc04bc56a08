//! Cart route handlers.
//!
//! The cart lives in the database, one line per (user, product). Stock is
//! checked here as a courtesy; the checkout transaction re-checks it under
//! lock and is the only place it is reserved.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quitanda_core::{CartLineId, Money, ProductId, Quantity};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{CartLine, CurrentUser, Product};
use crate::services::checkout::SnapshotLine;
use crate::state::AppState;

/// Priced view of the cart.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<SnapshotLine>,
    pub total: Money,
    pub item_count: u32,
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: i64,
    /// Defaults to one unit.
    pub quantity: Option<i64>,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i64,
}

fn parse_quantity(value: i64) -> Result<Quantity> {
    Quantity::new(value).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn ensure_stock(product: &Product, quantity: Quantity) -> Result<()> {
    if product.has_stock_for(quantity.as_i32()) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Not enough stock for {} (only {} left)",
            product.name, product.stock
        )))
    }
}

/// Load a cart line and check it belongs to `user`.
async fn owned_line(state: &AppState, user: &CurrentUser, id: CartLineId) -> Result<CartLine> {
    let line = CartRepository::new(state.pool())
        .get_line(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart line {id}")))?;

    if line.user_id != user.id {
        return Err(AppError::Forbidden(format!("cart line {id}")));
    }
    Ok(line)
}

/// Show the priced cart.
///
/// GET /cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let snapshot = state.checkout().preview(user.id).await?;

    Ok(Json(CartView {
        total: snapshot.total(),
        item_count: snapshot.item_count(),
        lines: snapshot.lines().to_vec(),
    }))
}

/// Add a product to the cart.
///
/// POST /cart
///
/// Adding a product already in the cart increases that line's quantity.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToCart>,
) -> Result<(StatusCode, Json<CartLine>)> {
    let quantity = parse_quantity(body.quantity.unwrap_or(1))?;
    let product_id = ProductId::new(body.product_id);

    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    if !product.is_available {
        return Err(AppError::BadRequest(format!(
            "{} is not for sale",
            product.name
        )));
    }

    let cart = CartRepository::new(state.pool());
    let resulting = match cart.find_line(user.id, product_id).await? {
        Some(existing) => existing
            .quantity
            .checked_add(quantity)
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => quantity,
    };
    ensure_stock(&product, resulting)?;

    let line = cart.add(user.id, product_id, quantity).await?;

    let product_id = product_id.to_string();
    let quantity = line.quantity.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &product_id), ("quantity", &quantity)]),
    );

    Ok((StatusCode::CREATED, Json(line)))
}

/// Set the quantity of a cart line.
///
/// PATCH /cart/{line_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<i64>,
    Json(body): Json<UpdateQuantity>,
) -> Result<Json<CartLine>> {
    let quantity = parse_quantity(body.quantity)?;
    let line = owned_line(&state, &user, CartLineId::new(line_id)).await?;

    let product = ProductRepository::new(state.pool())
        .get_by_id(line.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", line.product_id)))?;
    ensure_stock(&product, quantity)?;

    let line = CartRepository::new(state.pool())
        .set_quantity(line.id, quantity)
        .await?;
    Ok(Json(line))
}

/// Remove a line from the cart.
///
/// DELETE /cart/{line_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<i64>,
) -> Result<StatusCode> {
    let line = owned_line(&state, &user, CartLineId::new(line_id)).await?;
    CartRepository::new(state.pool()).remove(line.id).await?;

    add_breadcrumb("cart", "Removed from cart", None);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Banana".to_string(),
            description: None,
            price: Money::from_cents(4_500),
            stock,
            image: None,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_quantity_bounds() {
        assert!(parse_quantity(0).is_err());
        assert!(parse_quantity(1000).is_err());
        assert_eq!(parse_quantity(3).unwrap().get(), 3);
    }

    #[test]
    fn test_ensure_stock() {
        let banana = product(3);
        assert!(ensure_stock(&banana, Quantity::new(3).unwrap()).is_ok());

        let err = ensure_stock(&banana, Quantity::new(4).unwrap()).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("only 3 left"));
    }
}
