use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Channel tag written on every ledger row derived from an order.
pub const SALE_TYPE_ONLINE: &str = "online";

/// Append-only sales ledger row, one per order line of a delivered order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub sale_id: i32,
    /// Order the row was derived from.
    pub order_id: i32,
    /// Placement timestamp of the originating order.
    pub sale_date: DateTime<Utc>,
    pub sale_type: String,
    pub product_id: i32,
    pub quantity_sold: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub unit_price_at_sale: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_sale_amount: Decimal,
    pub store_id: i32,
    pub customer_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::ProductId"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
