//! Order placement, lookup, cancellation and status endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::{Address, Contact, LineRequest, NewOrder, Order, PaymentMethod, StatusUpdate};
use fulfillment::{Actor, FulfillmentService, Permission, Role};
use serde::Deserialize;
use std::sync::Arc;
use store::FulfillmentStore;

use crate::error::ApiError;
use crate::extract::RequestActor;

/// Shared application state accessible from all handlers.
pub struct AppState<S: FulfillmentStore> {
    pub service: FulfillmentService<S>,
}

// -- Request types --

/// Checkout form. The buyer is the calling actor.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<LineRequest>,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub contact: Contact,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, user_id: UserId) -> NewOrder {
        NewOrder {
            user_id,
            items: self.items,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            payment_method: self.payment_method,
            contact: self.contact,
            coupon_code: self.coupon_code,
            customer_notes: self.customer_notes,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from the listed items.
#[tracing::instrument(skip(state, actor, req), fields(user_id = %actor.user_id))]
pub async fn create<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .service
        .create_order(req.into_new_order(actor.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /checkout: place an order from the caller's saved cart.
#[tracing::instrument(skip(state, actor, req), fields(user_id = %actor.user_id))]
pub async fn checkout<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .service
        .checkout_cart(req.into_new_order(actor.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.service.get_order(parse_order_id(&id)?).await?;
    ensure_visible(&actor, order.user_id())?;
    Ok(Json(order))
}

/// GET /orders/by-number/{number}
#[tracing::instrument(skip(state, actor))]
pub async fn get_by_number<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(number): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.service.get_order_by_number(&number).await?;
    ensure_visible(&actor, order.user_id())?;
    Ok(Json(order))
}

/// GET /users/{id}/orders: newest first.
#[tracing::instrument(skip(state, actor))]
pub async fn list_for_user<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let user_id: UserId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid user ID: {e}")))?;
    ensure_visible(&actor, user_id)?;
    Ok(Json(state.service.list_orders_for_user(user_id).await?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, actor), fields(actor = %actor.user_id))]
pub async fn cancel<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .service
        .cancel_order(parse_order_id(&id)?, &actor)
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/{id}/status: staff-side lifecycle update.
#[tracing::instrument(skip(state, actor, update), fields(actor = %actor.user_id))]
pub async fn update_status<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, ApiError> {
    if !actor.has_permission(Permission::UpdateOrderStatus) {
        return Err(ApiError::Forbidden(format!(
            "{} lacks the {} permission",
            actor.user_id,
            Permission::UpdateOrderStatus.as_str()
        )));
    }

    let outcome = state
        .service
        .update_order_status(parse_order_id(&id)?, update)
        .await?;
    Ok(Json(outcome.order))
}

/// Customers see their own orders; staff and admins see all of them.
fn ensure_visible(actor: &Actor, owner: UserId) -> Result<(), ApiError> {
    if actor.role != Role::Customer || actor.user_id == owner {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "orders belong to their customer".to_string(),
        ))
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
