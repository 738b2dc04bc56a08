//! Order/OrderItem materializer.
//!
//! Pure transformation from a cart snapshot into the rows a checkout writes.
//! Item name, image and price come from the snapshot, never from a fresh
//! product read.

use quitanda_core::{OrderStatus, PaymentMethod, UserId};

use super::snapshot::CartSnapshot;
use crate::models::{NewOrder, NewOrderItem};

/// Build the order header and items for a snapshot.
#[must_use]
pub fn order_records(
    user_id: UserId,
    payment_method: PaymentMethod,
    snapshot: &CartSnapshot,
) -> (NewOrder, Vec<NewOrderItem>) {
    let order = NewOrder {
        user_id,
        total: snapshot.total(),
        status: OrderStatus::Confirmed,
        payment_method,
    };

    let items = snapshot
        .lines()
        .iter()
        .map(|line| NewOrderItem {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            product_image: line.product_image.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect();

    (order, items)
}
