mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use shopkeeper_api::{
    config::SalesValuation,
    entities::OrderStatus,
    services::{order_status::StatusPolicy, sales::SalesRecorder, PageRequest},
};

use common::{money, TestApp};

const STORE: i32 = 1;

/// Places an order over HTTP, then reprices the product before delivery.
async fn deliver_after_price_change(app: &TestApp) -> i32 {
    let customer = app.seed_customer(STORE, "Asha Rao").await;
    let product = app.seed_product(STORE, "Headphones", dec!(100.00)).await;

    let (status, body) = app
        .call_as(
            STORE,
            Method::POST,
            "/api/orders",
            Some(json!({
                "customer_id": customer,
                "total_amount": 200,
                "status": "Pending",
                "store_id": STORE,
                "items": [{ "product_id": product, "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["orderId"].as_i64().unwrap() as i32;

    app.set_price(product, dec!(120.00)).await;

    for next in ["Processing", "Shipped", "Delivered"] {
        let (status, _) = app
            .call_as(
                STORE,
                Method::PUT,
                &format!("/api/orders/{order_id}/status"),
                Some(json!({ "status": next, "storeId": STORE })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    order_id
}

#[tokio::test]
async fn delivery_valuation_uses_current_catalog_price() {
    let app = TestApp::new().await;
    let order_id = deliver_after_price_change(&app).await;

    let sales = app.sales_for(order_id).await;
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].unit_price_at_sale, dec!(120));
    assert_eq!(sales[0].total_sale_amount, dec!(240));
}

#[tokio::test]
async fn placement_valuation_uses_price_captured_on_the_order() {
    let app = TestApp::with_config(|cfg| cfg.sales_valuation = SalesValuation::Placement).await;
    let order_id = deliver_after_price_change(&app).await;

    let sales = app.sales_for(order_id).await;
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].unit_price_at_sale, dec!(100));
    assert_eq!(sales[0].total_sale_amount, dec!(200));
}

#[tokio::test]
async fn recorder_runs_on_a_caller_transaction() {
    use sea_orm::TransactionTrait;

    let app = TestApp::new().await;
    let customer = app.seed_customer(STORE, "Mei Lin").await;
    let lamp = app.seed_product(STORE, "Desk Lamp", dec!(35.25)).await;
    let order_id = app
        .seed_order(STORE, customer, OrderStatus::Delivered, Utc::now(), &[(lamp, 4, dec!(35.25))])
        .await;

    let recorder = SalesRecorder::new(app.state.db.clone(), SalesValuation::Delivery);

    // Rolled back: nothing persists.
    let txn = app.state.db.begin().await.unwrap();
    assert_eq!(recorder.record_sales(&txn, order_id, STORE).await.unwrap(), 1);
    txn.rollback().await.unwrap();
    assert!(app.sales_for(order_id).await.is_empty());

    // Wrong store resolves no lines.
    let txn = app.state.db.begin().await.unwrap();
    assert!(recorder.record_sales(&txn, order_id, STORE + 1).await.is_err());
    txn.rollback().await.unwrap();

    let txn = app.state.db.begin().await.unwrap();
    assert_eq!(recorder.record_sales(&txn, order_id, STORE).await.unwrap(), 1);
    assert_eq!(recorder.record_sales(&txn, order_id, STORE).await.unwrap(), 0);
    txn.commit().await.unwrap();

    let sales = app.sales_for(order_id).await;
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].quantity_sold, 4);
    assert_eq!(sales[0].total_sale_amount, dec!(141.00));
}

#[tokio::test]
async fn ledger_lists_newest_sales_first_per_store() {
    let app = TestApp::lenient().await;
    let customer = app.seed_customer(STORE, "Daniel Okafor").await;
    let keyboard = app.seed_product(STORE, "Keyboard", dec!(120.00)).await;
    let charger = app.seed_product(STORE, "Charger", dec!(30.00)).await;

    let now = Utc::now();
    let older = app
        .seed_order(
            STORE,
            customer,
            OrderStatus::Shipped,
            now - Duration::days(2),
            &[(keyboard, 1, dec!(120.00))],
        )
        .await;
    let newer = app
        .seed_order(
            STORE,
            customer,
            OrderStatus::Shipped,
            now - Duration::days(1),
            &[(charger, 2, dec!(30.00)), (keyboard, 1, dec!(120.00))],
        )
        .await;

    for order_id in [older, newer] {
        let (status, _) = app
            .call_as(
                STORE,
                Method::PUT,
                &format!("/api/orders/{order_id}/status"),
                Some(json!({ "status": "Delivered", "storeId": STORE })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .call_as(STORE, Method::GET, "/api/sales?storeId=1&limit=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["totalPages"], 2);
    let rows = body["sales"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["order_id"] == newer));
    assert!(rows.iter().all(|r| r["sale_type"] == "online"));

    let (_, body) = app
        .call_as(STORE, Method::GET, "/api/sales?storeId=1&page=2&limit=2", None)
        .await;
    let rows = body["sales"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["order_id"], older);
    assert_eq!(rows[0]["product_name"], "Keyboard");
    assert_eq!(money(&rows[0]["total_sale_amount"]), dec!(120));

    let (status, body) = app
        .call_as(2, Method::GET, "/api/sales?storeId=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let page = app
        .state
        .services
        .sales
        .list_sales(STORE, PageRequest::new(Some(1), 10))
        .await
        .unwrap();
    let ledger_total: Decimal = page.sales.iter().map(|s| s.total_sale_amount).sum();
    assert_eq!(ledger_total, dec!(300));
}

#[test]
fn default_policy_is_strict() {
    assert!(StatusPolicy::default().is_strict());
}
