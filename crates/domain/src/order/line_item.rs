//! Order line items.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::{Money, Product};

/// Denormalized product details kept for display after the catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub thumbnail: Option<String>,
    /// Catalog list price at order time.
    pub price: Money,
}

/// A line in a placed order. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub variant_id: Option<String>,
    pub quantity: u32,
    /// Effective price captured when the order was placed.
    pub unit_price: Money,
    pub snapshot: ProductSnapshot,
}

impl OrderLineItem {
    /// Captures the product's current effective price and display details.
    pub fn from_product(product: &Product, quantity: u32, variant_id: Option<String>) -> Self {
        Self {
            product_id: product.id.clone(),
            variant_id,
            quantity,
            unit_price: product.effective_price(),
            snapshot: ProductSnapshot {
                name: product.name.clone(),
                thumbnail: product.thumbnail.clone(),
                price: product.price,
            },
        }
    }

    /// Returns quantity * unit_price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_captures_effective_price() {
        let mut product = Product::new("SKU-001", "Widget", Money::from_cents(1000), 10);
        product.discount_price = Some(Money::from_cents(750));

        let item = OrderLineItem::from_product(&product, 2, Some("red".to_string()));
        assert_eq!(item.unit_price.cents(), 750);
        assert_eq!(item.snapshot.price.cents(), 1000);
        assert_eq!(item.line_total().cents(), 1500);

        // Later catalog changes do not touch the captured line.
        product.price = Money::from_cents(5000);
        product.discount_price = None;
        assert_eq!(item.unit_price.cents(), 750);
    }
}
