//! Checkout route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quitanda_core::{Money, PaymentMethod, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::checkout::{CheckoutError, SnapshotLine};
use crate::state::AppState;

/// A payment method as offered to the customer.
#[derive(Debug, Serialize)]
pub struct PaymentOption {
    pub code: &'static str,
    pub name: &'static str,
}

impl From<PaymentMethod> for PaymentOption {
    fn from(method: PaymentMethod) -> Self {
        Self {
            code: method.as_str(),
            name: method.display_name(),
        }
    }
}

/// What the customer is about to buy.
#[derive(Debug, Serialize)]
pub struct CheckoutPreview {
    pub lines: Vec<SnapshotLine>,
    pub total: Money,
    pub payment_methods: Vec<PaymentOption>,
    /// Products in the cart that are no longer for sale.
    pub unavailable: Vec<ProductId>,
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct PlaceOrder {
    pub payment_method: String,
}

/// Preview the order the current cart would produce.
///
/// GET /checkout
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn preview(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CheckoutPreview>> {
    let snapshot = state.checkout().preview(user.id).await?;
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    Ok(Json(CheckoutPreview {
        unavailable: snapshot.unavailable().map(|line| line.product_id).collect(),
        total: snapshot.total(),
        payment_methods: PaymentMethod::ALL.into_iter().map(Into::into).collect(),
        lines: snapshot.lines().to_vec(),
    }))
}

/// Place the order.
///
/// POST /checkout
///
/// Returns the created order with its frozen item snapshots.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    add_breadcrumb(
        "checkout",
        "Checkout started",
        Some(&[("payment_method", body.payment_method.as_str())]),
    );

    let order = state.checkout().checkout(&user, &body.payment_method).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_options() {
        let options: Vec<PaymentOption> = PaymentMethod::ALL.into_iter().map(Into::into).collect();
        assert_eq!(options.len(), 2);
        assert!(options.iter().any(|o| o.code == "card" && o.name == "Cartão"));
        assert!(options.iter().any(|o| o.code == "mpesa" && o.name == "M-Pesa"));
    }
}
