//! Inputs to the order operations.

use std::collections::BTreeMap;

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{Address, Contact, OrderStatus, PaymentMethod};
use crate::{ValidationError, normalize_code};

/// Largest quantity accepted on one line.
pub const MAX_LINE_QUANTITY: u32 = 1000;
pub const MAX_CUSTOMER_NOTES_LEN: usize = 1000;
pub const MAX_ADMIN_NOTES_LEN: usize = 2000;
pub const MAX_TRACKING_NUMBER_LEN: usize = 100;

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

impl LineRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            variant_id: None,
        }
    }
}

/// Request to turn a cart into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    /// In cart order; the placed order keeps this order.
    pub items: Vec<LineRequest>,
    pub shipping_address: Address,
    /// Defaults to the shipping address.
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub contact: Contact,
    pub coupon_code: Option<String>,
    pub customer_notes: Option<String>,
}

impl NewOrder {
    /// Rejects malformed input before any transaction starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        for line in &self.items {
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(ValidationError::InvalidQuantity {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    max: MAX_LINE_QUANTITY,
                });
            }
        }

        self.shipping_address.validate("shipping")?;
        if let Some(billing) = &self.billing_address {
            billing.validate("billing")?;
        }
        self.contact.validate()?;

        if self
            .customer_notes
            .as_ref()
            .is_some_and(|notes| notes.chars().count() > MAX_CUSTOMER_NOTES_LEN)
        {
            return Err(ValidationError::TooLong {
                field: "customer_notes",
                max: MAX_CUSTOMER_NOTES_LEN,
            });
        }

        Ok(())
    }

    /// The normalized coupon code, or None when absent or blank.
    pub fn coupon_code(&self) -> Option<String> {
        self.coupon_code
            .as_deref()
            .map(normalize_code)
            .filter(|code| !code.is_empty())
    }

    /// Total quantity requested per product, summing repeated lines.
    pub fn requested_quantities(&self) -> BTreeMap<ProductId, u32> {
        let mut totals = BTreeMap::new();
        for line in &self.items {
            *totals.entry(line.product_id.clone()).or_insert(0) += line.quantity;
        }
        totals
    }

    pub fn billing_address(&self) -> &Address {
        self.billing_address
            .as_ref()
            .unwrap_or(&self.shipping_address)
    }
}

/// Admin-side change to an order's lifecycle fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<super::PaymentStatus>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl StatusUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(tracking) = &self.tracking_number {
            if tracking.trim().is_empty() {
                return Err(ValidationError::BlankTrackingNumber);
            }
            if tracking.chars().count() > MAX_TRACKING_NUMBER_LEN {
                return Err(ValidationError::TooLong {
                    field: "tracking_number",
                    max: MAX_TRACKING_NUMBER_LEN,
                });
            }
        }

        if self
            .admin_notes
            .as_ref()
            .is_some_and(|notes| notes.chars().count() > MAX_ADMIN_NOTES_LEN)
        {
            return Err(ValidationError::TooLong {
                field: "admin_notes",
                max: MAX_ADMIN_NOTES_LEN,
            });
        }

        if self.status == Some(OrderStatus::Cancelled) && self.payment_status.is_some() {
            return Err(ValidationError::CancellationWithPaymentStatus);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentStatus;

    fn new_order() -> NewOrder {
        NewOrder {
            user_id: UserId::new(),
            items: vec![LineRequest::new("SKU-001", 2)],
            shipping_address: Address {
                full_name: "Ada Lovelace".to_string(),
                line1: "12 Analytical Way".to_string(),
                line2: None,
                city: "London".to_string(),
                state: None,
                postal_code: "NW1".to_string(),
                country: "GB".to_string(),
                phone: None,
            },
            billing_address: None,
            payment_method: PaymentMethod::Card,
            contact: Contact {
                email: "ada@example.com".to_string(),
                phone: None,
            },
            coupon_code: None,
            customer_notes: None,
        }
    }

    #[test]
    fn test_valid_order() {
        assert!(new_order().validate().is_ok());
    }

    #[test]
    fn test_empty_order_rejected() {
        let mut order = new_order();
        order.items.clear();
        assert_eq!(order.validate(), Err(ValidationError::NoItems));
    }

    #[test]
    fn test_quantity_bounds() {
        let mut order = new_order();
        order.items[0].quantity = 0;
        assert!(matches!(
            order.validate(),
            Err(ValidationError::InvalidQuantity { quantity: 0, .. })
        ));

        order.items[0].quantity = MAX_LINE_QUANTITY + 1;
        assert!(order.validate().is_err());

        order.items[0].quantity = MAX_LINE_QUANTITY;
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_long_notes_rejected() {
        let mut order = new_order();
        order.customer_notes = Some("x".repeat(MAX_CUSTOMER_NOTES_LEN + 1));
        assert!(matches!(
            order.validate(),
            Err(ValidationError::TooLong {
                field: "customer_notes",
                ..
            })
        ));
    }

    #[test]
    fn test_blank_coupon_code_is_absent() {
        let mut order = new_order();
        order.coupon_code = Some("   ".to_string());
        assert_eq!(order.coupon_code(), None);

        order.coupon_code = Some(" save10 ".to_string());
        assert_eq!(order.coupon_code().as_deref(), Some("SAVE10"));
    }

    #[test]
    fn test_requested_quantities_sum_repeated_lines() {
        let mut order = new_order();
        order.items.push(LineRequest::new("SKU-002", 1));
        order.items.push(LineRequest::new("SKU-001", 3));

        let totals = order.requested_quantities();
        assert_eq!(totals[&ProductId::new("SKU-001")], 5);
        assert_eq!(totals[&ProductId::new("SKU-002")], 1);
    }

    #[test]
    fn test_billing_defaults_to_shipping() {
        let order = new_order();
        assert_eq!(order.billing_address(), &order.shipping_address);
    }

    #[test]
    fn test_status_update_validation() {
        let update = StatusUpdate {
            tracking_number: Some(" ".to_string()),
            ..StatusUpdate::default()
        };
        assert_eq!(update.validate(), Err(ValidationError::BlankTrackingNumber));

        let update = StatusUpdate {
            status: Some(OrderStatus::Cancelled),
            payment_status: Some(PaymentStatus::Paid),
            ..StatusUpdate::default()
        };
        assert_eq!(
            update.validate(),
            Err(ValidationError::CancellationWithPaymentStatus)
        );

        assert!(StatusUpdate::status(OrderStatus::Shipped).validate().is_ok());
    }
}
