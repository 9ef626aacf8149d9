//! The fulfillment orchestrator.

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{
    CouponOutcome, CouponValidator, NewOrder, NotificationEvent, Order, OrderDraft,
    OrderLineItem, OrderNumber, PricingCalculator, StatusTransition, StatusUpdate,
    TransitionError,
};
use store::{FulfillmentStore, StoreError, StoreTransaction, release_all, reserve_all};

use crate::authorization::{Actor, CancelAuthorization, authorize_cancellation};
use crate::dispatcher::NotificationDispatcher;
use crate::error::{FulfillmentError, Result};
use crate::retry::RetryPolicy;
use crate::services::Recipient;

/// Result of [`FulfillmentService::update_order_status`].
#[derive(Debug, Clone)]
pub struct StatusUpdateOutcome {
    pub order: Order,
    /// Notifications raised by the update, already handed to the dispatcher.
    pub notifications: Vec<NotificationEvent>,
}

/// Turns carts into orders and drives them through their lifecycle.
///
/// Every mutating operation runs in one store transaction, re-run from
/// scratch when it loses a race with a concurrent one. Notifications go
/// out only after the transaction has committed.
pub struct FulfillmentService<S: FulfillmentStore> {
    store: S,
    pricing: PricingCalculator,
    retry: RetryPolicy,
    notifier: NotificationDispatcher,
}

impl<S: FulfillmentStore> FulfillmentService<S> {
    pub fn new(store: S, notifier: NotificationDispatcher) -> Self {
        Self {
            store,
            pricing: PricingCalculator::default(),
            retry: RetryPolicy::default(),
            notifier,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingCalculator) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &NotificationDispatcher {
        &self.notifier
    }

    /// Places an order: reserves stock, redeems the coupon, persists the
    /// order and clears the cart atomically, then notifies the customer
    /// and the administrators.
    ///
    /// An unknown or inapplicable coupon is not an error; the order is
    /// placed without a discount.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        let started = std::time::Instant::now();
        let result = self.place_order(&request).await;
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    order_number = %order.order_number(),
                    total = %order.total(),
                    "order created"
                );
                self.notifier.publish(
                    Recipient::customer_of(&order),
                    NotificationEvent::order_confirmed(&order),
                );
                self.notifier
                    .publish(Recipient::Admins, NotificationEvent::new_order_alert(&order));
                Ok(order)
            }
            Err(err) => {
                metrics::counter!("orders_create_failed_total", "reason" => err.kind().as_str())
                    .increment(1);
                tracing::info!(error = %err, kind = %err.kind(), "order rejected");
                Err(err)
            }
        }
    }

    /// Places an order for the user's saved cart when `request` carries no
    /// items of its own.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout_cart(&self, mut request: NewOrder) -> Result<Order> {
        if request.items.is_empty() {
            request.items = self
                .store
                .cart(request.user_id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect();
        }
        self.create_order(request).await
    }

    async fn place_order(&self, request: &NewOrder) -> Result<Order> {
        request.validate()?;
        let coupon_code = request.coupon_code();

        self.retry
            .run("create_order", |attempt| {
                self.try_place_order(request, coupon_code.as_deref(), attempt)
            })
            .await
    }

    async fn try_place_order(
        &self,
        request: &NewOrder,
        coupon_code: Option<&str>,
        attempt: u32,
    ) -> Result<Order> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut items: Vec<OrderLineItem> = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = tx
                .product(&line.product_id)
                .await?
                .ok_or_else(|| FulfillmentError::ProductNotFound(line.product_id.clone()))?;
            if !product.is_active {
                return Err(FulfillmentError::ProductInactive(product.id));
            }
            items.push(OrderLineItem::from_product(
                &product,
                line.quantity,
                line.variant_id.clone(),
            ));
        }

        let subtotal = PricingCalculator::checked_subtotal(&items)?;

        // Conditional decrements; a shortfall aborts the whole transaction.
        let quantities = request.requested_quantities();
        if let Some(shortfall) = reserve_all(&mut tx, &quantities).await? {
            return Err(FulfillmentError::InsufficientStock {
                product_id: shortfall.product_id,
                requested: shortfall.requested,
                available: shortfall.available,
            });
        }

        let applied = match coupon_code {
            Some(code) => {
                let coupon = tx.coupon_by_code(code).await?;
                let outcome = CouponValidator::validate(coupon.as_ref(), subtotal, now);
                if let CouponOutcome::Inapplicable(reason) = &outcome {
                    tracing::debug!(code, %reason, "coupon not applied");
                }
                outcome.into_applied()
            }
            None => None,
        };

        let totals = self.pricing.compute(&items, applied.as_ref());
        let coupon_id = applied.as_ref().map(|a| a.coupon_id);

        let order = Order::create(OrderDraft {
            id: OrderId::new(),
            order_number: OrderNumber::generate(now),
            user_id: request.user_id,
            items,
            totals,
            coupon: applied,
            payment_method: request.payment_method,
            shipping_address: request.shipping_address.clone(),
            billing_address: request.billing_address().clone(),
            contact: request.contact.clone(),
            customer_notes: request.customer_notes.clone(),
            created_at: now,
        });
        tx.insert_order(&order).await?;

        if let Some(coupon_id) = coupon_id
            && !tx.redeem_coupon(coupon_id).await?
        {
            // Another order took the last use after we validated. The retry
            // re-validates and places the order without the discount.
            let reason = format!("coupon {coupon_id} reached its usage limit");
            return Err(StoreError::Conflict(reason).into());
        }

        tx.clear_cart(request.user_id).await?;
        tx.commit().await?;

        if attempt > 1 {
            tracing::debug!(attempt, "order placed after retry");
        }
        Ok(order)
    }

    /// Cancels an order on behalf of `actor`, returning its stock and coupon
    /// use. Cancelling an already-cancelled order succeeds without changes.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn cancel_order(&self, order_id: OrderId, actor: &Actor) -> Result<Order> {
        let (order, transition) = self
            .retry
            .run("cancel_order", |_| self.try_cancel(order_id, actor))
            .await?;

        if let Some(transition) = transition {
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(
                order_number = %order.order_number(),
                from = %transition.from,
                payment_status = %order.payment_status(),
                "order cancelled"
            );
            self.notifier.publish(
                Recipient::customer_of(&order),
                NotificationEvent::status_changed(&order, transition.from),
            );
        }
        Ok(order)
    }

    async fn try_cancel(
        &self,
        order_id: OrderId,
        actor: &Actor,
    ) -> Result<(Order, Option<StatusTransition>)> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        if authorize_cancellation(actor, &order)? == CancelAuthorization::AlreadyCancelled {
            return Ok((order, None));
        }

        let transition = order
            .cancel(Utc::now())
            .map_err(|err| cancellation_error(&order, err))?;
        return_reserved(&mut tx, &order).await?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        Ok((order, Some(transition)))
    }

    /// Applies an administrative status update. A move into CANCELLED has
    /// the same stock and coupon effects as [`Self::cancel_order`].
    #[tracing::instrument(skip(self, update))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<StatusUpdateOutcome> {
        update.validate()?;

        let (order, transition) = self
            .retry
            .run("update_order_status", |_| self.try_update(order_id, &update))
            .await?;

        let mut notifications = Vec::new();
        if let Some(transition) = transition {
            metrics::counter!(
                "order_status_changes_total",
                "to" => transition.to.as_str()
            )
            .increment(1);
            if transition.is_cancellation() {
                metrics::counter!("orders_cancelled_total").increment(1);
            }
            tracing::info!(
                order_number = %order.order_number(),
                from = %transition.from,
                to = %transition.to,
                "order status changed"
            );

            let event = NotificationEvent::status_changed(&order, transition.from);
            self.notifier
                .publish(Recipient::customer_of(&order), event.clone());
            notifications.push(event);
        }

        Ok(StatusUpdateOutcome {
            order,
            notifications,
        })
    }

    async fn try_update(
        &self,
        order_id: OrderId,
        update: &StatusUpdate,
    ) -> Result<(Order, Option<StatusTransition>)> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;

        let transition = order
            .apply_update(update, Utc::now())
            .map_err(|err| cancellation_error(&order, err))?;
        if transition.is_some_and(|t| t.is_cancellation()) {
            return_reserved(&mut tx, &order).await?;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        Ok((order, transition))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order> {
        let number = OrderNumber::parse(order_number.trim())?;
        self.store
            .order_by_number(&number)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(number.to_string()))
    }

    /// A user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }
}

/// Gives back what creating `order` took: stock for every line and the
/// coupon use, if any.
async fn return_reserved<T: StoreTransaction>(tx: &mut T, order: &Order) -> Result<()> {
    release_all(tx, order.items()).await?;
    if let Some(coupon_id) = order.coupon_id() {
        tx.unredeem_coupon(coupon_id).await?;
    }
    Ok(())
}

fn cancellation_error(order: &Order, err: TransitionError) -> FulfillmentError {
    match err {
        TransitionError::NotCancellable { status } => FulfillmentError::InvalidStateForCancellation {
            order_number: order.order_number().clone(),
            status,
        },
        other => FulfillmentError::InvalidTransition(other),
    }
}
