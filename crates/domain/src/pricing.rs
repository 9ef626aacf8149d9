//! Order totals.

use serde::{Deserialize, Serialize};

use crate::{AppliedCoupon, Money, OrderLineItem, ValidationError};

/// Largest subtotal an order may carry, in cents. Leaves headroom for
/// shipping and tax within `i64`.
pub const MAX_ORDER_SUBTOTAL: Money = Money::from_cents(1_000_000_000_000_000);

/// Fixed pricing inputs. Tax is a flat placeholder rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    /// Shipping charged on every order without a free-shipping coupon.
    pub shipping_baseline: Money,
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            shipping_baseline: Money::from_cents(1000),
            tax_rate_bps: 1000,
        }
    }
}

/// Computed totals for an order.
///
/// Holds `total == subtotal - discount + shipping + tax` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl PriceBreakdown {
    /// Returns true when the totals add up.
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal - self.discount + self.shipping + self.tax
    }
}

/// Pure totals calculation over captured line items.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PricingConfig {
        self.config
    }

    /// Sum of `unit_price * quantity` over all items.
    pub fn subtotal(items: &[OrderLineItem]) -> Money {
        items.iter().map(OrderLineItem::line_total).sum()
    }

    /// Like [`Self::subtotal`], but rejects totals that overflow or exceed
    /// [`MAX_ORDER_SUBTOTAL`].
    pub fn checked_subtotal(items: &[OrderLineItem]) -> Result<Money, ValidationError> {
        let too_large = ValidationError::AmountTooLarge {
            field: "subtotal",
            max: MAX_ORDER_SUBTOTAL,
        };
        let mut subtotal = Money::zero();
        for item in items {
            subtotal = item
                .unit_price
                .checked_multiply(item.quantity)
                .and_then(|line| subtotal.checked_add(line))
                .ok_or_else(|| too_large.clone())?;
        }
        if subtotal > MAX_ORDER_SUBTOTAL {
            return Err(too_large);
        }
        Ok(subtotal)
    }

    /// Computes subtotal, discount, shipping, tax and total.
    pub fn compute(&self, items: &[OrderLineItem], coupon: Option<&AppliedCoupon>) -> PriceBreakdown {
        let subtotal = Self::subtotal(items);
        let discount = coupon
            .map(|c| c.discount)
            .unwrap_or_default()
            .clamp_to(subtotal);
        let shipping = if coupon.is_some_and(|c| c.free_shipping) {
            Money::zero()
        } else {
            self.config.shipping_baseline
        };
        let tax = (subtotal - discount).apply_rate_bps(self.config.tax_rate_bps);
        let total = subtotal - discount + shipping + tax;

        PriceBreakdown {
            subtotal,
            discount,
            shipping,
            tax,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use common::CouponId;

    use super::*;
    use crate::Product;

    fn items() -> Vec<OrderLineItem> {
        let product = Product::new("P", "Widget", Money::from_cents(1000), 5);
        vec![OrderLineItem::from_product(&product, 2, None)]
    }

    fn coupon(discount: i64, free_shipping: bool) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: CouponId::new(),
            code: "TEST".to_string(),
            discount: Money::from_cents(discount),
            free_shipping,
        }
    }

    #[test]
    fn test_totals_without_coupon() {
        let totals = PricingCalculator::default().compute(&items(), None);
        assert_eq!(totals.subtotal.cents(), 2000);
        assert_eq!(totals.discount.cents(), 0);
        assert_eq!(totals.shipping.cents(), 1000);
        assert_eq!(totals.tax.cents(), 200);
        assert_eq!(totals.total.cents(), 3200);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_totals_with_percentage_coupon() {
        let totals = PricingCalculator::default().compute(&items(), Some(&coupon(200, false)));
        assert_eq!(totals.subtotal.cents(), 2000);
        assert_eq!(totals.discount.cents(), 200);
        assert_eq!(totals.shipping.cents(), 1000);
        assert_eq!(totals.tax.cents(), 180);
        assert_eq!(totals.total.cents(), 2980);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_free_shipping_zeroes_shipping() {
        let totals = PricingCalculator::default().compute(&items(), Some(&coupon(0, true)));
        assert_eq!(totals.shipping.cents(), 0);
        assert_eq!(totals.total.cents(), 2200);
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        let totals = PricingCalculator::default().compute(&items(), Some(&coupon(10_000, false)));
        assert_eq!(totals.discount.cents(), 2000);
        assert_eq!(totals.tax.cents(), 0);
        assert_eq!(totals.total.cents(), 1000);
        assert!(!totals.total.is_negative());
    }

    #[test]
    fn test_checked_subtotal_rejects_overflow() {
        assert_eq!(PricingCalculator::checked_subtotal(&items()).unwrap().cents(), 2000);

        let product = Product::new("HUGE", "Yacht", Money::from_cents(i64::MAX / 2), 5);
        let huge = vec![OrderLineItem::from_product(&product, 3, None)];
        assert!(matches!(
            PricingCalculator::checked_subtotal(&huge),
            Err(ValidationError::AmountTooLarge { field: "subtotal", .. })
        ));

        let product = Product::new("BIG", "Jet", MAX_ORDER_SUBTOTAL, 5);
        let mut lines = vec![OrderLineItem::from_product(&product, 1, None)];
        assert!(PricingCalculator::checked_subtotal(&lines).is_ok());
        lines.extend(items());
        assert!(PricingCalculator::checked_subtotal(&lines).is_err());
    }

    #[test]
    fn test_custom_config() {
        let calculator = PricingCalculator::new(PricingConfig {
            shipping_baseline: Money::from_cents(499),
            tax_rate_bps: 825,
        });
        let totals = calculator.compute(&items(), None);
        // 2000 * 8.25% = 165
        assert_eq!(totals.tax.cents(), 165);
        assert_eq!(totals.total.cents(), 2000 + 499 + 165);
    }
}
