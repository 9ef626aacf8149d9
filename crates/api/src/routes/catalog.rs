//! Admin seeding of the products and coupons orders are placed against.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::ProductId;
use domain::{Coupon, CouponStatus, Discount, Money, Product};
use fulfillment::{Actor, Role};
use serde::Deserialize;
use store::FulfillmentStore;

use crate::error::ApiError;
use crate::extract::RequestActor;
use crate::routes::orders::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub discount_price: Option<Money>,
    pub stock: u32,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub discount: Discount,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: CouponStatus,
}

/// PUT /products/{id}: create or replace a product. Prices are bounded by
/// [`domain::MAX_UNIT_PRICE`].
#[tracing::instrument(skip(state, actor, req))]
pub async fn put_product<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>, ApiError> {
    ensure_admin(&actor)?;

    let product = Product {
        id: ProductId::new(id.trim()),
        name: req.name,
        thumbnail: req.thumbnail,
        price: req.price,
        discount_price: req.discount_price,
        stock: req.stock,
        is_active: req.is_active,
    };
    product.validate()?;
    state.service.store().upsert_product(product.clone()).await?;
    Ok(Json(product))
}

/// PUT /coupons/{code}: create or replace a coupon, keeping its id and
/// redemption count when it already exists. A usage limit below that count
/// is rejected.
#[tracing::instrument(skip(state, actor, req))]
pub async fn put_coupon<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Path(code): Path<String>,
    Json(req): Json<CouponRequest>,
) -> Result<Json<Coupon>, ApiError> {
    ensure_admin(&actor)?;
    if code.trim().is_empty() {
        return Err(ApiError::BadRequest("coupon code is required".to_string()));
    }

    let store = state.service.store();
    let mut coupon = match store.coupon_by_code(&code).await? {
        Some(existing) => Coupon {
            discount: req.discount,
            ..existing
        },
        None => Coupon::new(&code, req.discount),
    };
    coupon.min_purchase = req.min_purchase;
    coupon.usage_limit = req.usage_limit;
    coupon.valid_from = req.valid_from;
    coupon.valid_until = req.valid_until;
    coupon.status = req.status;
    coupon.validate()?;

    store.upsert_coupon(coupon.clone()).await?;
    Ok(Json(coupon))
}

fn ensure_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("catalog changes need the admin role".to_string()))
    }
}
