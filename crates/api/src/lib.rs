//! HTTP API server for order fulfillment.
//!
//! Exposes checkout, order lookup, cancellation and status updates over
//! [`fulfillment::FulfillmentService`], with structured logging (tracing)
//! and Prometheus metrics. Caller identity arrives in headers set by the
//! session layer, see [`extract::RequestActor`].

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use fulfillment::{FulfillmentService, LoggingChannel, NotificationChannel, NotificationDispatcher};
use metrics_exporter_prometheus::PrometheusHandle;
use store::FulfillmentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: FulfillmentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/by-number/{number}",
            get(routes::orders::get_by_number::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/users/{id}/orders", get(routes::orders::list_for_user::<S>))
        .route(
            "/cart",
            get(routes::cart::get::<S>).put(routes::cart::put::<S>),
        )
        .route("/products/{id}", put(routes::catalog::put_product::<S>))
        .route("/coupons/{code}", put(routes::catalog::put_coupon::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over `store`, with notifications logged on
/// the email, SMS and push channels.
///
/// Spawns the notification worker, so this must run inside a Tokio runtime.
pub fn create_default_state<S: FulfillmentStore + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![
        Arc::new(LoggingChannel::new("email")),
        Arc::new(LoggingChannel::new("sms")),
        Arc::new(LoggingChannel::new("push")),
    ];
    let notifier = NotificationDispatcher::spawn(channels, config.dispatcher_config());

    let service = FulfillmentService::new(store, notifier)
        .with_pricing(domain::PricingCalculator::new(config.pricing))
        .with_retry_policy(config.retry_policy());

    Arc::new(AppState { service })
}
