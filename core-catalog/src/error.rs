//! Error types for the catalog data layer

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The API answered with a non-success status
    #[error("Catalog API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response did not match the expected schema
    #[error("Catalog response failed schema validation: {0}")]
    Schema(String),

    /// Caller passed something the API cannot accept
    #[error("Invalid catalog request: {0}")]
    InvalidRequest(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] BridgeError),
}

impl CatalogError {
    /// Schema and request errors are contract violations; retrying cannot fix them.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CatalogError::Schema(_) | CatalogError::InvalidRequest(_))
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
