pub mod common;
pub mod health;
pub mod orders;
pub mod sales;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{order_status::StatusPolicy, orders::OrderService, sales::SalesRecorder},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub sales: Arc<SalesRecorder>,
}

impl AppServices {
    /// Wires the services from the shared pool and configuration.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let sales = SalesRecorder::new(db_pool.clone(), config.sales_valuation);
        let policy = StatusPolicy::new(config.strict_status_transitions);

        Self {
            orders: Arc::new(OrderService::new(db_pool, policy, sales.clone())),
            sales: Arc::new(sales),
        }
    }
}
