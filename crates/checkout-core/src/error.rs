//! Error Types

use std::time::Duration;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Missing or unusable configuration (e.g. gateway credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input or request shape failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Financing gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Checkout attempted without any tire or wheel selected
    #[error("No product selection")]
    NoSelection,

    /// Price lookup failed
    #[error("Price unavailable for {sku}: {reason}")]
    Pricing { sku: String, reason: String },

    /// Cart persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Action not allowed in the current flow state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Manual retry (with a fresh order id) may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Gateway(e) => e.is_retryable(),
            CheckoutError::Pricing { .. } | CheckoutError::Storage(_) => true,
            _ => false,
        }
    }

    /// Convert to a user-facing notice
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Config(_) => "Financing is not available right now.".into(),
            CheckoutError::Validation(_) => "Please fill in all required fields correctly".into(),
            CheckoutError::Gateway(e) => format!("Failed to start financing: {}", e.user_message()),
            CheckoutError::NoSelection => "Please select products in the visualizer first".into(),
            CheckoutError::Pricing { .. } => "We couldn't price your selection. Please try again.".into(),
            CheckoutError::Storage(_) => "Your cart could not be saved.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

/// Failures talking to the financing partner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured bound
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Partner answered with a non-success status
    #[error("Financing API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response arrived but is unusable (e.g. no launch URL)
    #[error("Invalid response from financing API: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Upstream HTTP status, when the partner returned one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Never retried automatically; this only says a new attempt is worth offering
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => true,
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Protocol(_) => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Network(_) => "Could not reach the financing service. Please try again.".into(),
            GatewayError::Timeout(_) => "The financing service took too long to respond. Please try again.".into(),
            GatewayError::Status { message, .. } => message.clone(),
            GatewayError::Protocol(_) => "The financing service returned an unexpected response.".into(),
        }
    }
}
