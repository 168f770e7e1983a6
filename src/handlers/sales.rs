use axum::{extract::State, response::Response};
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::{opt_flexible_id, scoped_store, success_response, ApiQuery};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{sales::SalesPage, PageRequest},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSalesQuery {
    #[serde(rename = "storeId", default, deserialize_with = "opt_flexible_id")]
    #[param(value_type = Option<i32>)]
    pub store_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Sales ledger of a store, newest sale first
#[utoipa::path(
    get,
    path = "/api/sales",
    summary = "List sales",
    params(ListSalesQuery),
    responses(
        (status = 200, description = "Sales retrieved successfully", body = SalesPage),
        (status = 400, description = "storeId missing or malformed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListSalesQuery>,
) -> Result<Response, ServiceError> {
    let store_id = scoped_store(&user, query.store_id, "storeId is required")?;
    let page = PageRequest::new(query.page, state.config.page_size(query.limit));

    let sales = state.services.sales.list_sales(store_id, page).await?;
    Ok(success_response(sales))
}
