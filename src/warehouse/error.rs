//! Errors surfaced while authenticating to or querying the warehouse.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Please enter a query.")]
    EmptyQuery,

    #[error("invalid service account private key: {0}")]
    InvalidKey(String),

    #[error("failed to sign token request")]
    Signing,

    #[error("token exchange failed ({status}): {message}")]
    Token { status: u16, message: String },

    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("query job failed: {0}")]
    Job(String),

    #[error("unexpected response from BigQuery: {0}")]
    Decode(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
