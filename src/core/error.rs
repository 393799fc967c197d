use thiserror::Error;

/// Main error type for the workload reporting service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed input for a workload event; rejected before any transport attempt
    #[error("Invalid workload event: {0}")]
    InvalidEvent(String),

    /// Broker unreachable, HTTP non-2xx or timeout
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ServiceError {
    /// Stable error code used in API error responses
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidEvent(_) => "INVALID_WORKLOAD_EVENT",
            ServiceError::TransportFailure(_) => "TRANSPORT_FAILURE",
            ServiceError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::SerializationError(_) => "SERIALIZATION_ERROR",
            ServiceError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            ServiceError::ValidationError(_) => "VALIDATION_ERROR",
            ServiceError::IoError(_) => "IO_ERROR",
        }
    }
}

/// Result type for the workload reporting service
pub type Result<T> = std::result::Result<T, ServiceError>;
