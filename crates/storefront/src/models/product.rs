//! Product catalog rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use quitanda_core::{Money, ProductId};

/// A product as stored in `storefront.product`.
///
/// `stock` is the contended resource during checkout and is never negative.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub image: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `requested` units can currently be supplied.
    #[must_use]
    pub fn has_stock_for(&self, requested: i32) -> bool {
        self.stock >= requested
    }
}
