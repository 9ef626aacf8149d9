//! Catalog product records as seen by the fulfillment subsystem.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::{Money, ValidationError};

/// Highest list or sale price a product may carry, in cents.
pub const MAX_UNIT_PRICE: Money = Money::from_cents(100_000_000_000);

/// A catalog product.
///
/// The catalog owns every field; fulfillment only ever changes `stock`,
/// and only inside an order transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub thumbnail: Option<String>,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub stock: u32,
    pub is_active: bool,
}

impl Product {
    /// Creates an active product without a sale price or thumbnail.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            thumbnail: None,
            price,
            discount_price: None,
            stock,
            is_active: true,
        }
    }

    /// The price a shopper pays: the sale price when it is set and lower
    /// than the list price, otherwise the list price.
    pub fn effective_price(&self) -> Money {
        match self.discount_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    /// Checks the catalog fields fulfillment relies on: a non-blank id and
    /// name, and prices within `[0, MAX_UNIT_PRICE]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("product id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("product name"));
        }
        check_price("price", self.price)?;
        if let Some(sale) = self.discount_price {
            check_price("discount_price", sale)?;
        }
        Ok(())
    }
}

fn check_price(field: &'static str, price: Money) -> Result<(), ValidationError> {
    if price.is_negative() {
        return Err(ValidationError::NegativeAmount { field });
    }
    if price > MAX_UNIT_PRICE {
        return Err(ValidationError::AmountTooLarge {
            field,
            max: MAX_UNIT_PRICE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price_prefers_lower_sale_price() {
        let mut product = Product::new("SKU-001", "Widget", Money::from_cents(1000), 5);
        assert_eq!(product.effective_price().cents(), 1000);

        product.discount_price = Some(Money::from_cents(800));
        assert_eq!(product.effective_price().cents(), 800);

        product.discount_price = Some(Money::from_cents(1200));
        assert_eq!(product.effective_price().cents(), 1000);
    }

    #[test]
    fn test_validate_bounds_prices() {
        let mut product = Product::new("SKU-001", "Widget", Money::from_cents(1000), 5);
        assert!(product.validate().is_ok());

        product.price = MAX_UNIT_PRICE;
        assert!(product.validate().is_ok());

        product.price = Money::from_cents(5_000_000_000_000_000_000);
        assert!(matches!(
            product.validate(),
            Err(ValidationError::AmountTooLarge { field: "price", .. })
        ));

        product.price = Money::from_cents(1000);
        product.discount_price = Some(Money::from_cents(-1));
        assert_eq!(
            product.validate(),
            Err(ValidationError::NegativeAmount {
                field: "discount_price"
            })
        );

        product.discount_price = None;
        product.name = "  ".to_string();
        assert_eq!(
            product.validate(),
            Err(ValidationError::MissingField("product name"))
        );
    }
}
