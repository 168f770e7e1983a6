use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopkeeper API",
        version = "0.1.0",
        description = r#"
# Shopkeeper back-office API

Order management for multi-store shops. Marking an order `Delivered` appends
one row per order line to the store's sales ledger, in the same transaction as
the status change.

## Authentication

Every `/api` endpoint requires a `shop_owner` JWT:

```
Authorization: Bearer <your-jwt-token>
```

The token's `store_id` must match the `storeId` of the request.

## Order statuses

`Pending → Processing → Shipped → Delivered`, with `Cancelled` reachable from
`Pending` and `Processing`. `Delivered` and `Cancelled` are final.

## Errors

```json
{
  "error": "Bad Request",
  "message": "storeId is required",
  "request_id": "5b0f...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Orders", description = "Order store endpoints"),
        (name = "Sales", description = "Sales ledger endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_store_products,
        crate::handlers::orders::list_store_customers,
        crate::handlers::sales::list_sales,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::entities::OrderStatus,
            crate::handlers::orders::CreateOrderBody,
            crate::handlers::orders::CreateOrderItemBody,
            crate::handlers::orders::CreateOrderResponse,
            crate::handlers::orders::UpdateStatusBody,
            crate::handlers::orders::UpdateStatusResponse,
            crate::services::orders::OrderSummary,
            crate::services::orders::OrderPage,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderLine,
            crate::services::orders::StoreProduct,
            crate::services::orders::StoreCustomer,
            crate::services::sales::SaleRow,
            crate::services::sales::SalesPage,
            crate::handlers::health::HealthResponse,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
