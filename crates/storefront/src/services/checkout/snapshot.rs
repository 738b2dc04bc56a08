//! Cart snapshot reader.
//!
//! Turns the unlocked cart read into the immutable list of lines and the
//! grand total that a checkout operates on. The same snapshot backs the cart
//! view and the checkout preview.

use std::collections::BTreeMap;

use serde::Serialize;

use quitanda_core::{Money, ProductId, Quantity};

use crate::models::CartEntry;

/// One priced line of a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub line_total: Money,
    pub is_available: bool,
}

/// Immutable view of a cart at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    lines: Vec<SnapshotLine>,
    total: Money,
}

impl CartSnapshot {
    /// Build a snapshot from joined cart rows, keeping their order.
    #[must_use]
    pub fn from_entries(entries: Vec<CartEntry>) -> Self {
        let lines: Vec<SnapshotLine> = entries
            .into_iter()
            .map(|entry| SnapshotLine {
                product_id: entry.product_id,
                line_total: entry.unit_price.times(entry.quantity),
                product_name: entry.product_name,
                product_image: entry.product_image,
                unit_price: entry.unit_price,
                quantity: entry.quantity,
                is_available: entry.is_available,
            })
            .collect();
        let total = lines.iter().map(|line| line.line_total).sum();

        Self { lines, total }
    }

    /// Lines in cart order.
    #[must_use]
    pub fn lines(&self) -> &[SnapshotLine] {
        &self.lines
    }

    /// Sum of all line totals.
    #[must_use]
    pub const fn total(&self) -> Money {
        self.total
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .map(|line| u32::from(line.quantity.get()))
            .sum()
    }

    /// Units requested per distinct product, in ascending product id order.
    ///
    /// This is the order in which checkout locks product rows.
    #[must_use]
    pub fn demand(&self) -> BTreeMap<ProductId, i32> {
        let mut demand = BTreeMap::new();
        for line in &self.lines {
            *demand.entry(line.product_id).or_insert(0) += line.quantity.as_i32();
        }
        demand
    }

    /// Name of a product as captured in the snapshot.
    #[must_use]
    pub fn product_name(&self, product_id: ProductId) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.product_name.as_str())
    }

    /// Lines whose product has been withdrawn from sale.
    ///
    /// Checkout does not reject these; callers that want to can.
    pub fn unavailable(&self) -> impl Iterator<Item = &SnapshotLine> {
        self.lines.iter().filter(|line| !line.is_available)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quitanda_core::CartLineId;

    use super::*;

    fn entry(line: i64, product: i64, cents: u32, quantity: i64) -> CartEntry {
        CartEntry {
            line_id: CartLineId::new(line),
            product_id: ProductId::new(product),
            product_name: format!("product-{product}"),
            product_image: None,
            unit_price: Money::from_cents(cents),
            quantity: Quantity::new(quantity).unwrap(),
            stock: 100,
            is_available: true,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CartSnapshot::from_entries(Vec::new());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total(), Money::ZERO);
        assert!(snapshot.demand().is_empty());
    }

    #[test]
    fn test_totals() {
        let snapshot = CartSnapshot::from_entries(vec![entry(1, 1, 4500, 2), entry(2, 4, 8000, 1)]);
        assert_eq!(snapshot.lines()[0].line_total, Money::from_cents(9000));
        assert_eq!(snapshot.total(), Money::from_cents(17_000));
        assert_eq!(snapshot.item_count(), 3);
    }

    #[test]
    fn test_demand_is_sorted_by_product() {
        let snapshot = CartSnapshot::from_entries(vec![
            entry(1, 9, 100, 1),
            entry(2, 3, 100, 4),
            entry(3, 5, 100, 2),
        ]);
        let demand: Vec<(ProductId, i32)> = snapshot.demand().into_iter().collect();
        assert_eq!(
            demand,
            vec![
                (ProductId::new(3), 4),
                (ProductId::new(5), 2),
                (ProductId::new(9), 1),
            ]
        );
    }

    #[test]
    fn test_unavailable_lines_are_flagged() {
        let mut withdrawn = entry(2, 2, 100, 1);
        withdrawn.is_available = false;
        let snapshot = CartSnapshot::from_entries(vec![entry(1, 1, 100, 1), withdrawn]);
        let unavailable: Vec<ProductId> = snapshot.unavailable().map(|l| l.product_id).collect();
        assert_eq!(unavailable, vec![ProductId::new(2)]);
    }

    #[test]
    fn test_product_name_lookup() {
        let snapshot = CartSnapshot::from_entries(vec![entry(1, 7, 100, 1)]);
        assert_eq!(snapshot.product_name(ProductId::new(7)), Some("product-7"));
        assert_eq!(snapshot.product_name(ProductId::new(8)), None);
    }
}
