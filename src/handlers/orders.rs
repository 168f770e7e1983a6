use axum::{extract::State, response::Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{
    created_response, opt_flexible_id, scoped_store, success_response, ApiJson, ApiPath, ApiQuery,
};
use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    services::{
        order_status::StatusPolicy,
        orders::{NewOrder, NewOrderItem, OrderDetail, OrderPage, StoreCustomer, StoreProduct},
        PageRequest,
    },
    AppState,
};

const STORE_ID_REQUIRED: &str = "storeId is required";
const MISSING_FIELDS: &str = "Missing required fields";
const STATUS_FIELDS_REQUIRED: &str = "Status and storeId are required";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    /// Tenant whose orders are listed
    #[serde(rename = "storeId", default, deserialize_with = "opt_flexible_id")]
    #[param(value_type = Option<i32>)]
    pub store_id: Option<i32>,
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Page size (default 20, max 100)
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoreQuery {
    #[serde(rename = "storeId", default, deserialize_with = "opt_flexible_id")]
    #[param(value_type = Option<i32>)]
    pub store_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemBody {
    #[serde(default, deserialize_with = "opt_flexible_id")]
    #[schema(value_type = Option<i32>)]
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderBody {
    #[serde(default, deserialize_with = "opt_flexible_id")]
    #[schema(value_type = Option<i32>)]
    pub customer_id: Option<i32>,
    #[schema(value_type = Option<String>, example = "250.00")]
    pub total_amount: Option<Decimal>,
    #[schema(example = "Pending")]
    pub status: Option<String>,
    #[serde(default, alias = "storeId", deserialize_with = "opt_flexible_id")]
    #[schema(value_type = Option<i32>)]
    pub store_id: Option<i32>,
    pub items: Option<Vec<CreateOrderItemBody>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusBody {
    #[schema(example = "Delivered")]
    pub status: Option<String>,
    #[serde(rename = "storeId", alias = "store_id", default, deserialize_with = "opt_flexible_id")]
    #[schema(value_type = Option<i32>)]
    pub store_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub message: String,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub sales_recorded: u64,
}

impl CreateOrderBody {
    fn into_new_order(self) -> Result<NewOrder, ServiceError> {
        let missing = || ServiceError::ValidationError(MISSING_FIELDS.to_string());

        let (Some(store_id), Some(customer_id), Some(total_amount), Some(status), Some(items)) = (
            self.store_id,
            self.customer_id,
            self.total_amount,
            self.status,
            self.items,
        ) else {
            return Err(missing());
        };
        if items.is_empty() || status.trim().is_empty() {
            return Err(missing());
        }

        let items = items
            .into_iter()
            .map(|item| match (item.product_id, item.quantity) {
                (Some(product_id), Some(quantity)) => Ok(NewOrderItem {
                    product_id,
                    quantity,
                }),
                _ => Err(missing()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewOrder {
            store_id,
            customer_id,
            total_amount,
            status: StatusPolicy::parse(&status)?,
            items,
        })
    }
}

/// List a store's orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = OrderPage),
        (status = 400, description = "storeId missing or malformed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Database error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Response, ServiceError> {
    let store_id = scoped_store(&user, query.store_id, STORE_ID_REQUIRED)?;
    let page = PageRequest::new(query.page, state.config.page_size(query.limit));

    let orders = state.services.orders.list_orders(store_id, page).await?;
    Ok(success_response(orders))
}

/// Place an order with its lines
#[utoipa::path(
    post,
    path = "/api/orders",
    summary = "Create order",
    request_body = CreateOrderBody,
    responses(
        (status = 201, description = "Order created successfully", body = CreateOrderResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Database error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateOrderBody>,
) -> Result<Response, ServiceError> {
    let new_order = body.into_new_order()?;
    user.authorize_store(new_order.store_id)?;

    let order_id = state.services.orders.create_order(new_order).await?;
    Ok(created_response(CreateOrderResponse {
        message: "Order created successfully".to_string(),
        order_id,
    }))
}

/// Change an order's status; delivering an order records its sales
#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/status",
    summary = "Update order status",
    params(("order_id" = i32, Path, description = "Order ID")),
    request_body = UpdateStatusBody,
    responses(
        (status = 200, description = "Order status updated successfully", body = UpdateStatusResponse),
        (status = 400, description = "Missing fields, unknown status or illegal transition", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Order not found for this store or not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order items found for this order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order status changed concurrently", body = crate::errors::ErrorResponse),
        (status = 500, description = "Database error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(order_id): ApiPath<i32>,
    ApiJson(body): ApiJson<UpdateStatusBody>,
) -> Result<Response, ServiceError> {
    let status = body
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServiceError::ValidationError(STATUS_FIELDS_REQUIRED.to_string()))?;
    let store_id = scoped_store(&user, body.store_id, STATUS_FIELDS_REQUIRED)?;
    let new_status = StatusPolicy::parse(&status)?;

    let change = state
        .services
        .orders
        .update_status(order_id, new_status, store_id)
        .await?;

    Ok(success_response(UpdateStatusResponse {
        message: "Order status updated successfully".to_string(),
        previous_status: change.previous_status,
        status: change.status,
        sales_recorded: change.sales_recorded,
    }))
}

/// Fetch one order with its lines
#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    summary = "Get order",
    params(("order_id" = i32, Path, description = "Order ID"), StoreQuery),
    responses(
        (status = 200, description = "Order retrieved successfully", body = OrderDetail),
        (status = 400, description = "storeId missing or malformed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(order_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> Result<Response, ServiceError> {
    let store_id = scoped_store(&user, query.store_id, STORE_ID_REQUIRED)?;
    let order = state.services.orders.get_order(order_id, store_id).await?;
    Ok(success_response(order))
}

/// Catalog lookup for the order entry form
#[utoipa::path(
    get,
    path = "/api/orders/products",
    summary = "List store products",
    params(StoreQuery),
    responses(
        (status = 200, description = "Store catalog", body = [StoreProduct]),
        (status = 400, description = "storeId missing or malformed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_store_products(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> Result<Response, ServiceError> {
    let store_id = scoped_store(&user, query.store_id, STORE_ID_REQUIRED)?;
    let products = state.services.orders.list_store_products(store_id).await?;
    Ok(success_response(products))
}

/// Customer lookup for the order entry form
#[utoipa::path(
    get,
    path = "/api/orders/customers_orders",
    summary = "List store customers",
    params(StoreQuery),
    responses(
        (status = 200, description = "Store customers", body = [StoreCustomer]),
        (status = 400, description = "storeId missing or malformed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_store_customers(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> Result<Response, ServiceError> {
    let store_id = scoped_store(&user, query.store_id, STORE_ID_REQUIRED)?;
    let customers = state.services.orders.list_store_customers(store_id).await?;
    Ok(success_response(customers))
}
