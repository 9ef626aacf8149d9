//! Integration tests for coupon validation feeding the pricing calculator.

use chrono::{Duration, Utc};
use domain::{
    Coupon, CouponOutcome, CouponValidator, Discount, InapplicableReason, Money, OrderLineItem,
    PricingCalculator, PricingConfig, Product,
};

fn widget_lines(quantity: u32) -> Vec<OrderLineItem> {
    let product = Product::new("P", "Widget", Money::from_cents(1000), 5);
    vec![OrderLineItem::from_product(&product, quantity, None)]
}

fn save10() -> Coupon {
    let mut coupon = Coupon::new(
        "save10",
        Discount::Percentage {
            percent: 10,
            max_discount: None,
        },
    );
    coupon.min_purchase = Some(Money::from_cents(500));
    coupon.usage_limit = Some(100);
    coupon
}

#[test]
fn worked_example_totals() {
    let items = widget_lines(2);
    let subtotal = PricingCalculator::subtotal(&items);
    let outcome = CouponValidator::validate(Some(&save10()), subtotal, Utc::now());

    let totals = PricingCalculator::default().compute(&items, outcome.applied());

    assert_eq!(totals.subtotal.cents(), 2000);
    assert_eq!(totals.discount.cents(), 200);
    assert_eq!(totals.shipping.cents(), 1000);
    assert_eq!(totals.tax.cents(), 180);
    assert_eq!(totals.total.cents(), 2980);
    assert!(totals.is_consistent());
}

#[test]
fn inapplicable_coupon_degrades_to_no_discount() {
    let items = widget_lines(2);
    let mut coupon = save10();
    coupon.valid_until = Some(Utc::now() - Duration::days(1));

    let outcome = CouponValidator::validate(Some(&coupon), Money::from_cents(2000), Utc::now());
    assert_eq!(
        outcome,
        CouponOutcome::Inapplicable(InapplicableReason::Expired)
    );

    let totals = PricingCalculator::default().compute(&items, outcome.applied());
    assert_eq!(totals.discount, Money::zero());
    assert_eq!(totals.total.cents(), 2000 + 1000 + 200);
}

#[test]
fn oversized_fixed_coupon_never_makes_total_negative() {
    let items = widget_lines(1);
    let coupon = Coupon::new(
        "BIG",
        Discount::Fixed {
            amount: Money::from_cents(50_000),
        },
    );
    let outcome = CouponValidator::validate(Some(&coupon), Money::from_cents(1000), Utc::now());

    let totals = PricingCalculator::default().compute(&items, outcome.applied());
    assert_eq!(totals.discount.cents(), 1000);
    assert_eq!(totals.tax, Money::zero());
    assert_eq!(totals.total.cents(), 1000);
}

#[test]
fn free_shipping_with_custom_config() {
    let items = widget_lines(3);
    let coupon = Coupon::new("SHIPFREE", Discount::FreeShipping);
    let outcome = CouponValidator::validate(Some(&coupon), Money::from_cents(3000), Utc::now());

    let calculator = PricingCalculator::new(PricingConfig {
        shipping_baseline: Money::from_cents(799),
        tax_rate_bps: 825,
    });
    let totals = calculator.compute(&items, outcome.applied());

    assert_eq!(totals.shipping, Money::zero());
    // 3000 * 8.25% = 247.5, rounded half up
    assert_eq!(totals.tax.cents(), 248);
    assert_eq!(totals.total.cents(), 3248);
}
