//! Warehouse access: credentials, BigQuery REST queries and result caching.

mod auth;
mod cache;
mod client;
mod error;
mod models;

pub use cache::{CachedResult, CachedRunner, DEFAULT_TTL};
pub use client::{BigQueryClient, ClientConfig};
pub use error::WarehouseError;
pub use models::{Column, QueryResult, Value};

/// Something that can execute SQL and return a table
pub trait QueryRunner {
    fn run_query(&self, sql: &str) -> Result<QueryResult, WarehouseError>;
}

impl<T: QueryRunner + ?Sized> QueryRunner for Box<T> {
    fn run_query(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        (**self).run_query(sql)
    }
}
