//! Notification events raised by order operations.

use common::OrderId;
use serde::{Deserialize, Serialize};

use super::{Address, Order, OrderLineItem, OrderNumber, OrderStatus};
use crate::{Money, PriceBreakdown};

/// Events handed to the notification dispatcher after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    /// Sent to the customer once the order is placed.
    OrderConfirmed(OrderConfirmedData),

    /// Sent to administrators for every new order.
    NewOrderAlert(NewOrderAlertData),

    /// Sent to the customer when the order status changes.
    OrderStatusChanged(OrderStatusChangedData),
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::OrderConfirmed(_) => "OrderConfirmed",
            NotificationEvent::NewOrderAlert(_) => "NewOrderAlert",
            NotificationEvent::OrderStatusChanged(_) => "OrderStatusChanged",
        }
    }

    pub fn order_number(&self) -> &OrderNumber {
        match self {
            NotificationEvent::OrderConfirmed(data) => &data.order_number,
            NotificationEvent::NewOrderAlert(data) => &data.order_number,
            NotificationEvent::OrderStatusChanged(data) => &data.order_number,
        }
    }

    pub fn order_confirmed(order: &Order) -> Self {
        NotificationEvent::OrderConfirmed(OrderConfirmedData {
            order_number: order.order_number().clone(),
            customer_name: order.shipping_address().full_name.clone(),
            email: order.contact().email.clone(),
            items: order.items().to_vec(),
            totals: *order.totals(),
            shipping_address: order.shipping_address().clone(),
        })
    }

    pub fn new_order_alert(order: &Order) -> Self {
        NotificationEvent::NewOrderAlert(NewOrderAlertData {
            order_id: order.id(),
            order_number: order.order_number().clone(),
            customer_name: order.shipping_address().full_name.clone(),
            email: order.contact().email.clone(),
            item_count: order.total_quantity(),
            total: order.total(),
        })
    }

    pub fn status_changed(order: &Order, old_status: OrderStatus) -> Self {
        NotificationEvent::OrderStatusChanged(OrderStatusChangedData {
            order_number: order.order_number().clone(),
            email: order.contact().email.clone(),
            old_status,
            new_status: order.status(),
            tracking_number: order.tracking_number().map(str::to_string),
        })
    }
}

/// Data for OrderConfirmed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub email: String,
    pub items: Vec<OrderLineItem>,
    pub totals: PriceBreakdown,
    pub shipping_address: Address,
}

/// Data for NewOrderAlert event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderAlertData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub email: String,
    pub item_count: u32,
    pub total: Money,
}

/// Data for OrderStatusChanged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub order_number: OrderNumber,
    pub email: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub tracking_number: Option<String>,
}
