//! Error types and handling for memshuttle

/// Result type alias for memshuttle operations
pub type Result<T> = std::result::Result<T, ShuttleError>;

/// Error types for shared-memory region provisioning and access
#[derive(Debug, thiserror::Error)]
pub enum ShuttleError {
    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Backing store provisioning failures (create/size/attach)
    #[error("Provisioning error: {message}")]
    Provision { message: String },

    /// Value exceeds the fixed capacity of a region
    #[error("Capacity exceeded: value length {requested} larger than region capacity {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Store identity encoding/decoding errors
    #[error("Handoff error: {message}")]
    Handoff { message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl ShuttleError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a provisioning error
    pub fn provision(message: impl Into<String>) -> Self {
        Self::Provision {
            message: message.into(),
        }
    }

    /// Create a capacity exceeded error
    pub fn capacity_exceeded(requested: usize, capacity: usize) -> Self {
        Self::CapacityExceeded {
            requested,
            capacity,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a handoff error
    pub fn handoff(message: impl Into<String>) -> Self {
        Self::Handoff {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for ShuttleError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<bincode::Error> for ShuttleError {
    fn from(err: bincode::Error) -> Self {
        Self::handoff(format!("Bincode error: {}", err))
    }
}
