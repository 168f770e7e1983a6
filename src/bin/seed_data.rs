//! Seed data script - populates a store with demo customers, products and orders
//!
//! Run with: cargo run --bin seed-data -- --store-id 1
//!
//! Orders are created and advanced through the order service, so delivered
//! orders get their sales ledger rows exactly as they would over HTTP.

use std::{sync::Arc, time::Duration};

use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use tracing::info;

use shopkeeper_api::{
    auth::{AuthConfig, AuthService, SHOP_OWNER},
    config::SalesValuation,
    db,
    entities::{customer, product, OrderStatus},
    services::{
        order_status::StatusPolicy,
        orders::{NewOrder, NewOrderItem, OrderService},
        sales::SalesRecorder,
    },
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate a store with demo data")]
struct Args {
    /// Database to seed; falls back to $DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Store (tenant) the demo data belongs to
    #[arg(long, default_value_t = 1)]
    store_id: i32,

    /// Number of orders to create
    #[arg(long, default_value_t = 15)]
    orders: usize,

    /// Skip running migrations before seeding
    #[arg(long)]
    skip_migrations: bool,

    /// When set, prints a shop_owner token for the store signed with this secret
    #[arg(long)]
    jwt_secret: Option<String>,
}

const PRODUCTS: [(&str, Decimal); 6] = [
    ("Wireless Headphones", dec!(149.99)),
    ("USB-C Charger", dec!(29.00)),
    ("Laptop Sleeve", dec!(45.50)),
    ("Mechanical Keyboard", dec!(120.00)),
    ("Desk Lamp", dec!(35.25)),
    ("Webcam HD", dec!(79.90)),
];

const CUSTOMERS: [(&str, &str); 4] = [
    ("Asha Rao", "asha@example.com"),
    ("Daniel Okafor", "daniel@example.com"),
    ("Mei Lin", "mei@example.com"),
    ("Lucas Moreau", "lucas@example.com"),
];

/// Status walk applied to the n-th order, cycling.
const WALKS: [&[OrderStatus]; 5] = [
    &[],
    &[OrderStatus::Processing],
    &[OrderStatus::Processing, OrderStatus::Shipped],
    &[
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ],
    &[OrderStatus::Cancelled],
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://shopkeeper.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let conn = Arc::new(Database::connect(options).await?);
    if !args.skip_migrations {
        db::run_migrations(&conn).await?;
    }

    info!("Creating products...");
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (name, price) in PRODUCTS {
        let created = product::ActiveModel {
            store_id: Set(args.store_id),
            product_name: Set(name.to_string()),
            price: Set(price),
            ..Default::default()
        }
        .insert(&*conn)
        .await?;
        product_ids.push((created.product_id, price));
    }

    info!("Creating customers...");
    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for (name, email) in CUSTOMERS {
        let created = customer::ActiveModel {
            store_id: Set(args.store_id),
            customer_name: Set(name.to_string()),
            email: Set(Some(email.to_string())),
            ..Default::default()
        }
        .insert(&*conn)
        .await?;
        customer_ids.push(created.customer_id);
    }

    info!("Creating {} orders...", args.orders);
    let orders = OrderService::new(
        conn.clone(),
        StatusPolicy::strict(),
        SalesRecorder::new(conn.clone(), SalesValuation::default()),
    );

    let mut sales_recorded = 0;
    for n in 0..args.orders {
        let first = product_ids[n % product_ids.len()];
        let second = product_ids[(n + 2) % product_ids.len()];
        let first_qty = (n % 3 + 1) as i32;
        let total = first.1 * Decimal::from(first_qty) + second.1;

        let order_id = orders
            .create_order(NewOrder {
                store_id: args.store_id,
                customer_id: customer_ids[n % customer_ids.len()],
                total_amount: total,
                status: OrderStatus::Pending,
                items: vec![
                    NewOrderItem {
                        product_id: first.0,
                        quantity: first_qty,
                    },
                    NewOrderItem {
                        product_id: second.0,
                        quantity: 1,
                    },
                ],
            })
            .await?;

        for status in WALKS[n % WALKS.len()] {
            let change = orders.update_status(order_id, *status, args.store_id).await?;
            sales_recorded += change.sales_recorded;
        }
    }
    info!("  Created {} orders, {} sales rows", args.orders, sales_recorded);

    if let Some(secret) = args.jwt_secret {
        let auth = AuthService::new(AuthConfig::new(secret, Duration::from_secs(86_400)));
        let token = auth.issue_token(None, Some(args.store_id), SHOP_OWNER)?;
        info!("shop_owner token for store {}:", args.store_id);
        println!("{}", token);
    }

    info!("");
    info!("Try these API calls:");
    info!(
        "  curl -H 'Authorization: Bearer <token>' 'http://localhost:8080/api/orders?storeId={}'",
        args.store_id
    );
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}
