use crate::{
    config::SalesValuation,
    db::DbPool,
    entities::{
        order, order_item, product,
        sale::{self, SALE_TYPE_ONLINE},
    },
    errors::ServiceError,
    services::{total_pages, PageRequest},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

/// `quantity × unit_price`, rounded to cents.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    (Decimal::from(quantity) * unit_price).round_dp(2)
}

/// One order line resolved against its order and product.
#[derive(Debug, Clone, FromQueryResult)]
struct SaleLine {
    product_id: i32,
    quantity: i32,
    order_unit_price: Decimal,
    catalog_price: Decimal,
    date_ordered: DateTime<Utc>,
    customer_id: i32,
}

/// Ledger row as shown to the store owner.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct SaleRow {
    pub sale_id: i32,
    pub order_id: i32,
    pub sale_date: DateTime<Utc>,
    pub sale_type: String,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub quantity_sold: i32,
    #[schema(value_type = String)]
    pub unit_price_at_sale: Decimal,
    #[schema(value_type = String)]
    pub total_sale_amount: Decimal,
    pub customer_id: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesPage {
    pub sales: Vec<SaleRow>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

/// Derives sales ledger rows from delivered orders.
#[derive(Clone)]
pub struct SalesRecorder {
    db: Arc<DbPool>,
    valuation: SalesValuation,
}

impl SalesRecorder {
    pub fn new(db: Arc<DbPool>, valuation: SalesValuation) -> Self {
        Self { db, valuation }
    }

    /// Appends one ledger row per line of `order_id` and returns how many
    /// were written.
    ///
    /// Runs on the caller's connection so the rows commit or roll back with
    /// the status change that triggered them. An order that already has
    /// ledger rows is left alone and `0` is returned.
    #[instrument(skip(self, conn), fields(valuation = ?self.valuation))]
    pub async fn record_sales<C>(
        &self,
        conn: &C,
        order_id: i32,
        store_id: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let existing = sale::Entity::find()
            .filter(sale::Column::OrderId.eq(order_id))
            .count(conn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to check existing sales");
                ServiceError::DatabaseError(e)
            })?;
        if existing > 0 {
            warn!(order_id, existing, "sales already recorded for order, skipping");
            return Ok(0);
        }

        let lines = order_item::Entity::find()
            .select_only()
            .column_as(order_item::Column::ProductId, "product_id")
            .column_as(order_item::Column::Quantity, "quantity")
            .column_as(order_item::Column::UnitPrice, "order_unit_price")
            .column_as(product::Column::Price, "catalog_price")
            .column_as(order::Column::DateOrdered, "date_ordered")
            .column_as(order::Column::CustomerId, "customer_id")
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order::Column::StoreId.eq(store_id))
            .order_by_asc(order_item::Column::Id)
            .into_model::<SaleLine>()
            .all(conn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to load order lines for sales");
                ServiceError::DatabaseError(e)
            })?;

        if lines.is_empty() {
            error!(order_id, store_id, "delivered order has no items");
            return Err(ServiceError::NotFound(
                "No order items found for this order".to_string(),
            ));
        }

        let rows: Vec<sale::ActiveModel> = lines
            .iter()
            .map(|line| {
                let unit_price = match self.valuation {
                    SalesValuation::Delivery => line.catalog_price,
                    SalesValuation::Placement => line.order_unit_price,
                };
                sale::ActiveModel {
                    order_id: Set(order_id),
                    sale_date: Set(line.date_ordered),
                    sale_type: Set(SALE_TYPE_ONLINE.to_string()),
                    product_id: Set(line.product_id),
                    quantity_sold: Set(line.quantity),
                    unit_price_at_sale: Set(unit_price),
                    total_sale_amount: Set(line_total(line.quantity, unit_price)),
                    store_id: Set(store_id),
                    customer_id: Set(line.customer_id),
                    ..Default::default()
                }
            })
            .collect();
        let recorded = rows.len() as u64;

        sale::Entity::insert_many(rows)
            .exec(conn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to insert sales rows");
                ServiceError::DatabaseError(e)
            })?;

        counter!("shopkeeper.sales.recorded", recorded);
        info!(order_id, store_id, recorded, "sales recorded");
        Ok(recorded)
    }

    /// Store ledger, newest sale first.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        store_id: i32,
        page: PageRequest,
    ) -> Result<SalesPage, ServiceError> {
        let db = &*self.db;

        let paginator = sale::Entity::find()
            .select_only()
            .columns([
                sale::Column::SaleId,
                sale::Column::OrderId,
                sale::Column::SaleDate,
                sale::Column::SaleType,
                sale::Column::ProductId,
                sale::Column::QuantitySold,
                sale::Column::UnitPriceAtSale,
                sale::Column::TotalSaleAmount,
                sale::Column::CustomerId,
            ])
            .column_as(product::Column::ProductName, "product_name")
            .join(JoinType::LeftJoin, sale::Relation::Product.def())
            .filter(sale::Column::StoreId.eq(store_id))
            .order_by_desc(sale::Column::SaleDate)
            .order_by_desc(sale::Column::SaleId)
            .into_model::<SaleRow>()
            .paginate(db, page.limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, store_id, "Failed to count sales");
            ServiceError::DatabaseError(e)
        })?;
        let sales = if page.is_past(total) {
            Vec::new()
        } else {
            paginator.fetch_page(page.index()).await.map_err(|e| {
                error!(error = %e, store_id, "Failed to fetch sales page");
                ServiceError::DatabaseError(e)
            })?
        };

        Ok(SalesPage {
            sales,
            total,
            total_pages: total_pages(total, page.limit),
            current_page: page.page,
        })
    }
}
