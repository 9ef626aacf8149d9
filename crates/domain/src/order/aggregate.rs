//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CouponId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    Address, Contact, OrderLineItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
    StatusUpdate,
};
use crate::{AppliedCoupon, Money, PriceBreakdown, TransitionError};

/// Everything needed to place a new order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub items: Vec<OrderLineItem>,
    pub totals: PriceBreakdown,
    pub coupon: Option<AppliedCoupon>,
    pub payment_method: PaymentMethod,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub contact: Contact,
    pub customer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Every stored field of an order, used to rebuild one from storage.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub items: Vec<OrderLineItem>,
    pub totals: PriceBreakdown,
    pub coupon_code: Option<String>,
    pub coupon_id: Option<CouponId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub contact: Contact,
    pub customer_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl StatusTransition {
    pub fn is_cancellation(&self) -> bool {
        self.to == OrderStatus::Cancelled
    }
}

/// Order aggregate root: a header plus its immutable line items.
///
/// Financial fields are fixed at creation. Only the lifecycle methods
/// below change status, payment status, timestamps, tracking number and
/// admin notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    items: Vec<OrderLineItem>,
    totals: PriceBreakdown,
    coupon_code: Option<String>,
    coupon_id: Option<CouponId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    shipping_address: Address,
    billing_address: Address,
    contact: Contact,
    customer_notes: Option<String>,
    admin_notes: Option<String>,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new order in PENDING / payment PENDING.
    pub fn create(draft: OrderDraft) -> Self {
        debug_assert!(draft.totals.is_consistent());

        let (coupon_code, coupon_id) = match draft.coupon {
            Some(applied) => (Some(applied.code), Some(applied.coupon_id)),
            None => (None, None),
        };

        Self {
            id: draft.id,
            order_number: draft.order_number,
            user_id: draft.user_id,
            items: draft.items,
            totals: draft.totals,
            coupon_code,
            coupon_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: draft.payment_method,
            shipping_address: draft.shipping_address,
            billing_address: draft.billing_address,
            contact: draft.contact,
            customer_notes: draft.customer_notes,
            admin_notes: None,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        }
    }

    /// Rebuilds an order loaded from storage.
    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            user_id: parts.user_id,
            items: parts.items,
            totals: parts.totals,
            coupon_code: parts.coupon_code,
            coupon_id: parts.coupon_id,
            status: parts.status,
            payment_status: parts.payment_status,
            payment_method: parts.payment_method,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            contact: parts.contact,
            customer_notes: parts.customer_notes,
            admin_notes: parts.admin_notes,
            tracking_number: parts.tracking_number,
            shipped_at: parts.shipped_at,
            delivered_at: parts.delivered_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Line items in cart order.
    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    pub fn totals(&self) -> &PriceBreakdown {
        &self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn discount(&self) -> Money {
        self.totals.discount
    }

    pub fn shipping(&self) -> Money {
        self.totals.shipping
    }

    pub fn tax(&self) -> Money {
        self.totals.tax
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn coupon_id(&self) -> Option<CouponId> {
        self.coupon_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn customer_notes(&self) -> Option<&str> {
        self.customer_notes.as_deref()
    }

    pub fn admin_notes(&self) -> Option<&str> {
        self.admin_notes.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

// Lifecycle methods
impl Order {
    /// Moves the order to CANCELLED. Payment becomes REFUNDED if it had
    /// been PAID, FAILED otherwise.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<StatusTransition, TransitionError> {
        if !self.status.can_cancel() {
            return Err(TransitionError::NotCancellable {
                status: self.status,
            });
        }

        let transition = StatusTransition {
            from: self.status,
            to: OrderStatus::Cancelled,
        };
        self.status = OrderStatus::Cancelled;
        self.payment_status = self.payment_status.after_cancellation();
        self.updated_at = now;
        Ok(transition)
    }

    /// Applies an admin status update.
    ///
    /// Both transitions are checked before anything changes, so a rejected
    /// update leaves the order untouched. Returns the status transition when
    /// the status actually changed.
    pub fn apply_update(
        &mut self,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>, TransitionError> {
        let next_status = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next_status) {
            return Err(TransitionError::InvalidStatus {
                from: self.status,
                to: next_status,
            });
        }

        if let Some(next_payment) = update.payment_status {
            let terminal_change =
                self.status == OrderStatus::Cancelled && next_payment != self.payment_status;
            if terminal_change || !self.payment_status.can_transition_to(next_payment) {
                return Err(TransitionError::InvalidPayment {
                    from: self.payment_status,
                    to: next_payment,
                });
            }
        }

        if let Some(tracking) = &update.tracking_number {
            self.tracking_number = Some(tracking.trim().to_string());
        }
        if let Some(notes) = &update.admin_notes {
            self.admin_notes = Some(notes.clone());
        }

        // Payment lands first so a cancellation computes its refund from it.
        if let Some(next_payment) = update.payment_status {
            self.payment_status = next_payment;
        }

        let transition = if next_status == self.status {
            None
        } else if next_status == OrderStatus::Cancelled {
            Some(self.cancel(now)?)
        } else {
            let transition = StatusTransition {
                from: self.status,
                to: next_status,
            };
            self.status = next_status;
            match next_status {
                OrderStatus::Shipped => {
                    self.shipped_at.get_or_insert(now);
                }
                OrderStatus::Delivered => {
                    self.delivered_at.get_or_insert(now);
                }
                _ => {}
            }
            Some(transition)
        };

        self.updated_at = now;
        Ok(transition)
    }
}
