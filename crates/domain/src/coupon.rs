//! Coupons and the rules deciding whether one applies to an order.

use chrono::{DateTime, Utc};
use common::CouponId;
use serde::{Deserialize, Serialize};

use crate::{MAX_ORDER_SUBTOTAL, Money, ValidationError};

/// Lifecycle status of a coupon as maintained by the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "ACTIVE",
            CouponStatus::Inactive => "INACTIVE",
            CouponStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CouponStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CouponStatus::Active),
            "INACTIVE" => Ok(CouponStatus::Inactive),
            "EXPIRED" => Ok(CouponStatus::Expired),
            other => Err(format!("unknown coupon status: {other}")),
        }
    }
}

/// Discount type tag, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    Percentage,
    Fixed,
    FreeShipping,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "PERCENTAGE",
            DiscountKind::Fixed => "FIXED",
            DiscountKind::FreeShipping => "FREE_SHIPPING",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DiscountKind::Percentage),
            "FIXED" => Ok(DiscountKind::Fixed),
            "FREE_SHIPPING" => Ok(DiscountKind::FreeShipping),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// What a coupon takes off an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    /// A whole-number percentage of the subtotal, optionally capped.
    Percentage {
        percent: u32,
        max_discount: Option<Money>,
    },
    /// A fixed amount, never more than the subtotal.
    Fixed { amount: Money },
    /// Zeroes shipping; nothing comes off the goods.
    FreeShipping,
}

impl Discount {
    pub fn kind(&self) -> DiscountKind {
        match self {
            Discount::Percentage { .. } => DiscountKind::Percentage,
            Discount::Fixed { .. } => DiscountKind::Fixed,
            Discount::FreeShipping => DiscountKind::FreeShipping,
        }
    }

    /// Computes the goods discount for a subtotal. The result is always
    /// within `[0, subtotal]`.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        let raw = match *self {
            Discount::Percentage {
                percent,
                max_discount,
            } => {
                let amount = subtotal.percent(percent);
                match max_discount {
                    Some(cap) if amount > cap => cap,
                    _ => amount,
                }
            }
            Discount::Fixed { amount } => amount,
            Discount::FreeShipping => Money::zero(),
        };
        raw.clamp_to(subtotal)
    }

    /// Checks that the parameters describe a real discount: a percentage in
    /// `1..=100` and non-negative amounts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Discount::Percentage {
                percent,
                max_discount,
            } => {
                if !(1..=100).contains(&percent) {
                    return Err(ValidationError::InvalidPercent(percent));
                }
                if let Some(cap) = max_discount {
                    check_amount("max_discount", cap)?;
                }
                Ok(())
            }
            Discount::Fixed { amount } => check_amount("amount", amount),
            Discount::FreeShipping => Ok(()),
        }
    }
}

fn check_amount(field: &'static str, amount: Money) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::NegativeAmount { field });
    }
    if amount > MAX_ORDER_SUBTOTAL {
        return Err(ValidationError::AmountTooLarge {
            field,
            max: MAX_ORDER_SUBTOTAL,
        });
    }
    Ok(())
}

/// A coupon row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Always stored normalized, see [`normalize_code`].
    pub code: String,
    pub discount: Discount,
    pub min_purchase: Option<Money>,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: CouponStatus,
}

impl Coupon {
    /// Creates an active, unlimited, always-valid coupon.
    pub fn new(code: &str, discount: Discount) -> Self {
        Self {
            id: CouponId::new(),
            code: normalize_code(code),
            discount,
            min_purchase: None,
            usage_limit: None,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            status: CouponStatus::Active,
        }
    }

    /// Checks the admin-maintained fields before the coupon is stored. The
    /// usage limit may not drop below the uses already redeemed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.is_empty() {
            return Err(ValidationError::MissingField("coupon code"));
        }
        self.discount.validate()?;
        if let Some(minimum) = self.min_purchase {
            check_amount("min_purchase", minimum)?;
        }
        if let Some(limit) = self.usage_limit
            && limit < self.used_count
        {
            return Err(ValidationError::UsageLimitBelowUsed {
                limit,
                used: self.used_count,
            });
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
            && until < from
        {
            return Err(ValidationError::InvertedValidityWindow);
        }
        Ok(())
    }

    /// Returns true while redemptions remain under the usage limit.
    pub fn has_remaining_uses(&self) -> bool {
        self.usage_limit
            .is_none_or(|limit| self.used_count < limit)
    }
}

/// Normalizes a shopper-entered coupon code: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A coupon that passed validation, with the discount it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount: Money,
    pub free_shipping: bool,
}

/// Why a coupon did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InapplicableReason {
    NotFound,
    NotActive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimumPurchase { minimum: Money },
}

impl std::fmt::Display for InapplicableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InapplicableReason::NotFound => write!(f, "coupon not found"),
            InapplicableReason::NotActive => write!(f, "coupon is not active"),
            InapplicableReason::NotYetValid => write!(f, "coupon is not yet valid"),
            InapplicableReason::Expired => write!(f, "coupon has expired"),
            InapplicableReason::UsageLimitReached => write!(f, "coupon usage limit reached"),
            InapplicableReason::BelowMinimumPurchase { minimum } => {
                write!(f, "subtotal below minimum purchase of {minimum}")
            }
        }
    }
}

/// Result of validating a coupon against an order.
///
/// An inapplicable coupon is not an error: the order proceeds without a
/// discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponOutcome {
    Applied(AppliedCoupon),
    Inapplicable(InapplicableReason),
}

impl CouponOutcome {
    pub fn applied(&self) -> Option<&AppliedCoupon> {
        match self {
            CouponOutcome::Applied(applied) => Some(applied),
            CouponOutcome::Inapplicable(_) => None,
        }
    }

    pub fn into_applied(self) -> Option<AppliedCoupon> {
        match self {
            CouponOutcome::Applied(applied) => Some(applied),
            CouponOutcome::Inapplicable(_) => None,
        }
    }
}

/// Evaluates coupons against a running subtotal.
pub struct CouponValidator;

impl CouponValidator {
    /// Checks, in order and stopping at the first failure: existence and
    /// ACTIVE status, the validity window, the usage cap, and the minimum
    /// purchase. Window bounds are inclusive.
    pub fn validate(coupon: Option<&Coupon>, subtotal: Money, now: DateTime<Utc>) -> CouponOutcome {
        let Some(coupon) = coupon else {
            return CouponOutcome::Inapplicable(InapplicableReason::NotFound);
        };

        if coupon.status != CouponStatus::Active {
            return CouponOutcome::Inapplicable(InapplicableReason::NotActive);
        }

        if coupon.valid_from.is_some_and(|from| from > now) {
            return CouponOutcome::Inapplicable(InapplicableReason::NotYetValid);
        }

        if coupon.valid_until.is_some_and(|until| until < now) {
            return CouponOutcome::Inapplicable(InapplicableReason::Expired);
        }

        if !coupon.has_remaining_uses() {
            return CouponOutcome::Inapplicable(InapplicableReason::UsageLimitReached);
        }

        if let Some(minimum) = coupon.min_purchase
            && subtotal < minimum
        {
            return CouponOutcome::Inapplicable(InapplicableReason::BelowMinimumPurchase {
                minimum,
            });
        }

        CouponOutcome::Applied(AppliedCoupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            discount: coupon.discount.amount_for(subtotal),
            free_shipping: matches!(coupon.discount, Discount::FreeShipping),
        })
    }
}
