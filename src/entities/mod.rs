//! Database entities for the store back-office.
//!
//! Every table carries a `store_id` tenant column; queries are expected to
//! filter on it explicitly.

pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod sale;

pub use order::OrderStatus;
