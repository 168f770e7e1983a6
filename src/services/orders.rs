use crate::{
    db::DbPool,
    entities::{customer, order, order_item, product, OrderStatus},
    errors::ServiceError,
    services::{
        order_status::{StatusPolicy, Transition},
        sales::SalesRecorder,
        total_pages, PageRequest,
    },
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Line of a new order.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewOrderItem {
    pub product_id: i32,
    #[validate(range(min = 1, message = "Item quantity must be at least 1"))]
    pub quantity: i32,
}

/// Input of [`OrderService::create_order`].
#[derive(Debug, Clone, Validate)]
pub struct NewOrder {
    pub store_id: i32,
    pub customer_id: i32,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for item in &self.items {
            item.validate()?;
        }
        if self.total_amount.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Total amount cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Order row of the store listing.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct OrderSummary {
    pub order_id: i32,
    pub customer_id: i32,
    pub customer_name: Option<String>,
    pub store_id: i32,
    pub date_ordered: DateTime<Utc>,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct OrderLine {
    pub id: i32,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
}

/// A single order with its lines and the statuses it may move to next.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub items: Vec<OrderLine>,
    pub allowed_transitions: Vec<OrderStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusChange {
    pub order_id: i32,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub sales_recorded: u64,
    /// `false` when the order already had the requested status.
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct StoreProduct {
    pub product_id: i32,
    pub product_name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct StoreCustomer {
    pub customer_id: i32,
    pub customer_name: String,
}

/// Tenant-scoped order store.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    policy: StatusPolicy,
    sales: SalesRecorder,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, policy: StatusPolicy, sales: SalesRecorder) -> Self {
        Self {
            db_pool,
            policy,
            sales,
        }
    }

    /// One page of the store's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        store_id: i32,
        page: PageRequest,
    ) -> Result<OrderPage, ServiceError> {
        let db = &*self.db_pool;

        let paginator = order::Entity::find()
            .select_only()
            .columns([
                order::Column::OrderId,
                order::Column::CustomerId,
                order::Column::StoreId,
                order::Column::DateOrdered,
                order::Column::TotalAmount,
                order::Column::Status,
            ])
            .column_as(customer::Column::CustomerName, "customer_name")
            .join(JoinType::LeftJoin, order::Relation::Customer.def())
            .filter(order::Column::StoreId.eq(store_id))
            .order_by_desc(order::Column::DateOrdered)
            .order_by_desc(order::Column::OrderId)
            .into_model::<OrderSummary>()
            .paginate(db, page.limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, store_id, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let orders = if page.is_past(total) {
            Vec::new()
        } else {
            paginator.fetch_page(page.index()).await.map_err(|e| {
                error!(error = %e, store_id, "Failed to fetch orders page");
                ServiceError::DatabaseError(e)
            })?
        };

        Ok(OrderPage {
            orders,
            total,
            total_pages: total_pages(total, page.limit),
            current_page: page.page,
        })
    }

    /// Creates an order and its lines in one transaction and returns the new id.
    #[instrument(
        skip(self, request),
        fields(
            store_id = request.store_id,
            customer_id = request.customer_id,
            items = request.items.len()
        )
    )]
    pub async fn create_order(&self, request: NewOrder) -> Result<i32, ServiceError> {
        request.check()?;
        self.policy.check_initial(request.status)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let customer = customer::Entity::find_by_id(request.customer_id)
            .filter(customer::Column::StoreId.eq(request.store_id))
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up customer");
                ServiceError::DatabaseError(e)
            })?;
        if customer.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Customer {} does not belong to this store",
                request.customer_id
            )));
        }

        let product_ids: BTreeSet<i32> = request.items.iter().map(|i| i.product_id).collect();
        let prices: HashMap<i32, Decimal> = product::Entity::find()
            .filter(product::Column::ProductId.is_in(product_ids.iter().copied()))
            .filter(product::Column::StoreId.eq(request.store_id))
            .all(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up products");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|p| (p.product_id, p.price))
            .collect();
        if let Some(missing) = product_ids.iter().find(|id| !prices.contains_key(id)) {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is not in this store's catalog",
                missing
            )));
        }

        let created = order::ActiveModel {
            customer_id: Set(request.customer_id),
            store_id: Set(request.store_id),
            date_ordered: Set(Utc::now()),
            total_amount: Set(request.total_amount),
            status: Set(request.status),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let lines = request.items.iter().map(|item| order_item::ActiveModel {
            order_id: Set(created.order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(prices
                .get(&item.product_id)
                .copied()
                .unwrap_or_default()),
            store_id: Set(request.store_id),
            ..Default::default()
        });
        order_item::Entity::insert_many(lines)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = created.order_id, "Failed to insert order items");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(
                error = %e,
                order_id = created.order_id,
                "Failed to commit order creation transaction"
            );
            ServiceError::DatabaseError(e)
        })?;

        counter!("shopkeeper.orders.created", 1);
        info!(order_id = created.order_id, "Order created");
        Ok(created.order_id)
    }

    /// Moves an order of `store_id` to `new_status`, recording sales when the
    /// order is delivered. Status and sales commit together or not at all.
    #[instrument(skip(self, new_status), fields(new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: i32,
        new_status: OrderStatus,
        store_id: i32,
    ) -> Result<StatusChange, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        // Unknown ids and other stores' orders are indistinguishable to the caller.
        let current = order::Entity::find_by_id(order_id)
            .filter(order::Column::StoreId.eq(store_id))
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id, store_id, "status update for order outside store");
                ServiceError::Forbidden(
                    "Order not found for this store or not allowed".to_string(),
                )
            })?;

        let change = self
            .transition(&txn, order_id, store_id, current.status, new_status)
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        if change.changed {
            counter!("shopkeeper.orders.status_changed", 1);
            info!(
                order_id,
                previous_status = %change.previous_status,
                sales_recorded = change.sales_recorded,
                "Order status updated"
            );
        } else {
            info!(order_id, "status unchanged");
        }
        Ok(change)
    }

    /// Moves an order from the `observed` status to `new_status` on the
    /// caller's connection, recording sales on fulfilment.
    ///
    /// The write only applies while the stored status still equals
    /// `observed`; otherwise nothing is written and a conflict is returned.
    #[instrument(
        skip(self, conn, observed, new_status),
        fields(observed = %observed, new_status = %new_status)
    )]
    pub async fn transition<C>(
        &self,
        conn: &C,
        order_id: i32,
        store_id: i32,
        observed: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<StatusChange, ServiceError>
    where
        C: ConnectionTrait,
    {
        if self.policy.check(observed, new_status)? == Transition::Unchanged {
            return Ok(StatusChange {
                order_id,
                previous_status: observed,
                status: new_status,
                sales_recorded: 0,
                changed: false,
            });
        }

        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status.to_value()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::OrderId.eq(order_id))
            .filter(order::Column::StoreId.eq(store_id))
            .filter(order::Column::Status.eq(observed.to_value()))
            .exec(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to update order status");
                ServiceError::DatabaseError(e)
            })?;
        if result.rows_affected == 0 {
            warn!(order_id, %observed, "order status changed concurrently");
            return Err(ServiceError::Conflict(
                "Order status was changed by another request".to_string(),
            ));
        }

        let sales_recorded = if new_status.is_fulfillment() {
            self.sales.record_sales(conn, order_id, store_id).await?
        } else {
            0
        };

        Ok(StatusChange {
            order_id,
            previous_status: observed,
            status: new_status,
            sales_recorded,
            changed: true,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: i32,
        store_id: i32,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;

        let summary = order::Entity::find_by_id(order_id)
            .select_only()
            .columns([
                order::Column::OrderId,
                order::Column::CustomerId,
                order::Column::StoreId,
                order::Column::DateOrdered,
                order::Column::TotalAmount,
                order::Column::Status,
            ])
            .column_as(customer::Column::CustomerName, "customer_name")
            .join(JoinType::LeftJoin, order::Relation::Customer.def())
            .filter(order::Column::StoreId.eq(store_id))
            .into_model::<OrderSummary>()
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .select_only()
            .columns([
                order_item::Column::Id,
                order_item::Column::ProductId,
                order_item::Column::Quantity,
                order_item::Column::UnitPrice,
            ])
            .column_as(product::Column::ProductName, "product_name")
            .join(JoinType::LeftJoin, order_item::Relation::Product.def())
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .into_model::<OrderLine>()
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load order items");
                ServiceError::DatabaseError(e)
            })?;

        let allowed_transitions = self.policy.next_statuses(summary.status);
        Ok(OrderDetail {
            order: summary,
            items,
            allowed_transitions,
        })
    }

    /// Catalog of the store, for the order entry form.
    #[instrument(skip(self))]
    pub async fn list_store_products(
        &self,
        store_id: i32,
    ) -> Result<Vec<StoreProduct>, ServiceError> {
        product::Entity::find()
            .select_only()
            .columns([
                product::Column::ProductId,
                product::Column::ProductName,
                product::Column::Price,
            ])
            .filter(product::Column::StoreId.eq(store_id))
            .order_by_asc(product::Column::ProductName)
            .into_model::<StoreProduct>()
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list store products");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn list_store_customers(
        &self,
        store_id: i32,
    ) -> Result<Vec<StoreCustomer>, ServiceError> {
        customer::Entity::find()
            .select_only()
            .columns([customer::Column::CustomerId, customer::Column::CustomerName])
            .filter(customer::Column::StoreId.eq(store_id))
            .order_by_asc(customer::Column::CustomerName)
            .into_model::<StoreCustomer>()
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list store customers");
                ServiceError::DatabaseError(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn order_with(items: Vec<NewOrderItem>, total_amount: Decimal) -> NewOrder {
        NewOrder {
            store_id: 1,
            customer_id: 1,
            total_amount,
            status: OrderStatus::Pending,
            items,
        }
    }

    #[test]
    fn new_order_requires_items() {
        assert_matches!(
            order_with(vec![], dec!(10)).check(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn new_order_rejects_zero_quantity() {
        let items = vec![NewOrderItem {
            product_id: 1,
            quantity: 0,
        }];
        assert_matches!(
            order_with(items, dec!(10)).check(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn new_order_rejects_negative_total() {
        let items = vec![NewOrderItem {
            product_id: 1,
            quantity: 1,
        }];
        assert_matches!(
            order_with(items, dec!(-0.01)).check(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn valid_new_order_passes() {
        let items = vec![
            NewOrderItem {
                product_id: 1,
                quantity: 2,
            },
            NewOrderItem {
                product_id: 2,
                quantity: 1,
            },
        ];
        assert!(order_with(items, dec!(250)).check().is_ok());
    }
}
