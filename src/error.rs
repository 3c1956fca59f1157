//! Errors surfaced by the correlation layer.
//!
//! Binding and clearing never fail; only forwarding identifiers to a
//! downstream service can, when a value cannot be sent as a header.

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("invalid value for header {header}")]
    InvalidHeaderValue {
        header: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },
}

pub type CorrelationResult<T> = Result<T, CorrelationError>;
