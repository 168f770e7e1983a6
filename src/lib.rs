//! Shopkeeper API Library
//!
//! Multi-tenant store back-office: an order store whose `Delivered`
//! transition feeds an append-only sales ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, put},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::{AuthRouterExt, AuthService, SHOP_OWNER};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Builds the state from a connected pool and loaded configuration.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        let auth = Arc::new(AuthService::new(auth::AuthConfig::from(&config)));
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

/// Routes mounted under `/api`. All of them require a `shop_owner` token.
pub fn api_routes() -> Router<AppState> {
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/products",
            get(handlers::orders::list_store_products),
        )
        .route(
            "/orders/customers_orders",
            get(handlers::orders::list_store_customers),
        )
        .route("/orders/:order_id", get(handlers::orders::get_order))
        .route(
            "/orders/:order_id/status",
            put(handlers::orders::update_order_status),
        );

    let sales = Router::new().route("/sales", get(handlers::sales::list_sales));

    Router::new()
        .merge(orders)
        .merge(sales)
        .with_user_type(SHOP_OWNER)
}

/// Full application router with its cross-cutting layers.
pub fn build_router(state: AppState) -> Router {
    let auth = state.auth.clone();

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", api_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(auth))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
