//! Who may cancel which order.

use std::collections::BTreeSet;

use common::UserId;
use domain::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::FulfillmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Staff,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Cancel any PENDING or PROCESSING order, not just one's own.
    CancelAnyOrder,
    UpdateOrderStatus,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CancelAnyOrder => "cancel_any_order",
            Permission::UpdateOrderStatus => "update_order_status",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cancel_any_order" => Ok(Permission::CancelAnyOrder),
            "update_order_status" => Ok(Permission::UpdateOrderStatus),
            other => Err(format!("unknown permission: {other}")),
        }
    }
}

/// An already-authenticated caller, as supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
            permissions: BTreeSet::new(),
        }
    }

    pub fn staff(user_id: UserId, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            role: Role::Staff,
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            permissions: BTreeSet::new(),
        }
    }

    /// Admins hold every permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role == Role::Admin || self.permissions.contains(&permission)
    }

    pub fn owns(&self, order: &Order) -> bool {
        self.user_id == order.user_id()
    }
}

/// What a permitted cancellation request should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAuthorization {
    /// Cancel the order now.
    Proceed,
    /// The order is already cancelled; succeed without changes.
    AlreadyCancelled,
}

/// Applies the cancellation rule: owners may cancel their own PENDING
/// orders, holders of [`Permission::CancelAnyOrder`] may cancel any
/// PENDING or PROCESSING order.
pub fn authorize_cancellation(
    actor: &Actor,
    order: &Order,
) -> Result<CancelAuthorization, FulfillmentError> {
    let privileged = actor.has_permission(Permission::CancelAnyOrder);

    if !privileged && !actor.owns(order) {
        return Err(FulfillmentError::Forbidden(format!(
            "user {} may not cancel order {}",
            actor.user_id,
            order.order_number()
        )));
    }

    let status = order.status();
    if status == OrderStatus::Cancelled {
        return Ok(CancelAuthorization::AlreadyCancelled);
    }

    let allowed = if privileged {
        status.can_cancel()
    } else {
        status == OrderStatus::Pending
    };

    if allowed {
        Ok(CancelAuthorization::Proceed)
    } else {
        Err(FulfillmentError::InvalidStateForCancellation {
            order_number: order.order_number().clone(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::OrderId;
    use domain::{
        Address, Contact, Money, OrderDraft, OrderLineItem, OrderNumber, PaymentMethod,
        PricingCalculator, Product, StatusUpdate,
    };

    use super::*;

    fn order_owned_by(user_id: UserId, status: OrderStatus) -> Order {
        let address = Address {
            full_name: "Ada Lovelace".to_string(),
            line1: "12 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            state: None,
            postal_code: "NW1".to_string(),
            country: "GB".to_string(),
            phone: None,
        };
        let product = Product::new("P", "Widget", Money::from_cents(1000), 5);
        let items = vec![OrderLineItem::from_product(&product, 1, None)];
        let totals = PricingCalculator::default().compute(&items, None);
        let now = Utc::now();
        let mut order = Order::create(OrderDraft {
            id: OrderId::new(),
            order_number: OrderNumber::generate(now),
            user_id,
            items,
            totals,
            coupon: None,
            payment_method: PaymentMethod::Card,
            shipping_address: address.clone(),
            billing_address: address,
            contact: Contact {
                email: "ada@example.com".to_string(),
                phone: None,
            },
            customer_notes: None,
            created_at: now,
        });

        let path: &[OrderStatus] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Processing => &[OrderStatus::Processing],
            OrderStatus::Shipped => &[OrderStatus::Processing, OrderStatus::Shipped],
            OrderStatus::Delivered => &[
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ],
            OrderStatus::Cancelled => &[OrderStatus::Cancelled],
        };
        for next in path {
            order
                .apply_update(&StatusUpdate::status(*next), now)
                .unwrap();
        }
        order
    }

    #[test]
    fn test_owner_may_cancel_pending() {
        let user = UserId::new();
        let order = order_owned_by(user, OrderStatus::Pending);
        assert_eq!(
            authorize_cancellation(&Actor::customer(user), &order).unwrap(),
            CancelAuthorization::Proceed
        );
    }

    #[test]
    fn test_owner_may_not_cancel_processing() {
        let user = UserId::new();
        let order = order_owned_by(user, OrderStatus::Processing);
        assert!(matches!(
            authorize_cancellation(&Actor::customer(user), &order),
            Err(FulfillmentError::InvalidStateForCancellation {
                status: OrderStatus::Processing,
                ..
            })
        ));
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let order = order_owned_by(UserId::new(), OrderStatus::Pending);
        assert!(matches!(
            authorize_cancellation(&Actor::customer(UserId::new()), &order),
            Err(FulfillmentError::Forbidden(_))
        ));

        let staff_without_permission = Actor::staff(UserId::new(), [Permission::UpdateOrderStatus]);
        assert!(matches!(
            authorize_cancellation(&staff_without_permission, &order),
            Err(FulfillmentError::Forbidden(_))
        ));
    }

    #[test]
    fn test_privileged_staff_may_cancel_processing_but_not_shipped() {
        let staff = Actor::staff(UserId::new(), [Permission::CancelAnyOrder]);

        let processing = order_owned_by(UserId::new(), OrderStatus::Processing);
        assert_eq!(
            authorize_cancellation(&staff, &processing).unwrap(),
            CancelAuthorization::Proceed
        );

        let shipped = order_owned_by(UserId::new(), OrderStatus::Shipped);
        assert!(matches!(
            authorize_cancellation(&staff, &shipped),
            Err(FulfillmentError::InvalidStateForCancellation { .. })
        ));
    }

    #[test]
    fn test_admin_implies_every_permission() {
        let admin = Actor::admin(UserId::new());
        assert!(admin.has_permission(Permission::CancelAnyOrder));
        assert!(admin.has_permission(Permission::UpdateOrderStatus));

        let delivered = order_owned_by(UserId::new(), OrderStatus::Delivered);
        assert!(authorize_cancellation(&admin, &delivered).is_err());
    }

    #[test]
    fn test_cancelled_order_is_a_no_op_for_authorized_actors() {
        let user = UserId::new();
        let order = order_owned_by(user, OrderStatus::Cancelled);
        assert_eq!(
            authorize_cancellation(&Actor::customer(user), &order).unwrap(),
            CancelAuthorization::AlreadyCancelled
        );
        assert!(matches!(
            authorize_cancellation(&Actor::customer(UserId::new()), &order),
            Err(FulfillmentError::Forbidden(_))
        ));
    }

    #[test]
    fn test_parse_role_and_permission() {
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "cancel_any_order".parse::<Permission>().unwrap(),
            Permission::CancelAnyOrder
        );
        assert!("root".parse::<Role>().is_err());
    }
}
