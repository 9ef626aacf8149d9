//! The caller's saved cart, consumed by `POST /checkout`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{CartLine, MAX_LINE_QUANTITY, ValidationError};
use store::FulfillmentStore;

use crate::error::ApiError;
use crate::extract::RequestActor;
use crate::routes::orders::AppState;

/// GET /cart
pub async fn get<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    Ok(Json(state.service.store().cart(actor.user_id).await?))
}

/// PUT /cart: replace the cart with the given lines.
#[tracing::instrument(skip(state, actor, lines), fields(user_id = %actor.user_id, lines = lines.len()))]
pub async fn put<S: FulfillmentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    Json(lines): Json<Vec<CartLine>>,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    if let Some(line) = lines
        .iter()
        .find(|line| !(1..=MAX_LINE_QUANTITY).contains(&line.quantity))
    {
        return Err(ValidationError::InvalidQuantity {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            max: MAX_LINE_QUANTITY,
        }
        .into());
    }
    state
        .service
        .store()
        .put_cart(actor.user_id, lines.clone())
        .await?;
    Ok(Json(lines))
}
