#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use serde_json::Value;
use shopkeeper_api::{
    auth::SHOP_OWNER,
    config::AppConfig,
    db,
    entities::{customer, order, order_item, product, sale, OrderStatus},
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "k3Yb2pQ9xW7rT4mN8vC1zL6hF0dS5aJe";

/// Application backed by a throwaway SQLite file, driven in-process.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Strict transitions, delivery-time valuation.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Any status may follow any other.
    pub async fn lenient() -> Self {
        Self::with_config(|cfg| cfg.strict_status_transitions = false).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("shopkeeper_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = shopkeeper_api::build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Shop owner token scoped to `store_id`.
    pub fn token_for(&self, store_id: i32) -> String {
        self.token_with(store_id, SHOP_OWNER)
    }

    pub fn token_with(&self, store_id: i32, user_type: &str) -> String {
        self.state
            .auth
            .issue_token(Some(i64::from(store_id) * 100), Some(store_id), user_type)
            .expect("issue test token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request as the shop owner of `store_id`, returning status and JSON body.
    pub async fn call_as(
        &self,
        store_id: i32,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let token = self.token_for(store_id);
        let response = self.request(method, uri, body, Some(&token)).await;
        read_json(response).await
    }

    pub async fn seed_customer(&self, store_id: i32, name: &str) -> i32 {
        customer::ActiveModel {
            store_id: Set(store_id),
            customer_name: Set(name.to_string()),
            email: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer")
        .customer_id
    }

    pub async fn seed_product(&self, store_id: i32, name: &str, price: Decimal) -> i32 {
        product::ActiveModel {
            store_id: Set(store_id),
            product_name: Set(name.to_string()),
            price: Set(price),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
        .product_id
    }

    /// Inserts an order directly, bypassing status rules. Items are
    /// `(product_id, quantity, unit_price)`.
    pub async fn seed_order(
        &self,
        store_id: i32,
        customer_id: i32,
        status: OrderStatus,
        date_ordered: DateTime<Utc>,
        items: &[(i32, i32, Decimal)],
    ) -> i32 {
        let total: Decimal = items
            .iter()
            .map(|(_, qty, price)| Decimal::from(*qty) * *price)
            .sum();

        let order_id = order::ActiveModel {
            customer_id: Set(customer_id),
            store_id: Set(store_id),
            date_ordered: Set(date_ordered),
            total_amount: Set(total),
            status: Set(status),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed order")
        .order_id;

        for (product_id, quantity, unit_price) in items {
            order_item::ActiveModel {
                order_id: Set(order_id),
                product_id: Set(*product_id),
                quantity: Set(*quantity),
                unit_price: Set(*unit_price),
                store_id: Set(store_id),
                ..Default::default()
            }
            .insert(&*self.state.db)
            .await
            .expect("seed order item");
        }

        order_id
    }

    pub async fn order(&self, order_id: i32) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.state.db)
            .await
            .expect("load order")
            .expect("order exists")
    }

    pub async fn sales_for(&self, order_id: i32) -> Vec<sale::Model> {
        sale::Entity::find()
            .filter(sale::Column::OrderId.eq(order_id))
            .order_by_asc(sale::Column::SaleId)
            .all(&*self.state.db)
            .await
            .expect("load sales")
    }

    pub async fn count_orders(&self) -> u64 {
        order::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count orders")
    }

    pub async fn set_price(&self, product_id: i32, price: Decimal) {
        let mut model: product::ActiveModel = product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
            .into();
        model.price = Set(price);
        model.update(&*self.state.db).await.expect("update price");
    }

    /// Runs raw SQL, used to break tables mid-test.
    pub async fn execute(&self, sql: &str) {
        let backend = self.state.db.get_database_backend();
        self.state
            .db
            .execute(Statement::from_string(backend, sql.to_string()))
            .await
            .expect("execute raw sql");
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, body)
}

/// Reads a money field serialized either as a string or a number.
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a money value: {other}"),
    }
}
