use thiserror::Error;

/// Main error type for the DOE pipeline
#[derive(Error, Debug)]
pub enum DpError {
    #[error("Unsupported factor type: {0}")]
    UnsupportedFactorType(String),

    #[error("Unsupported design: {0}")]
    UnsupportedDesign(String),

    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for DOE pipeline operations
pub type DpResult<T> = Result<T, DpError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::errors::DpError::Validation(format!($($arg)*))
    };
}

/// Macro for creating not-implemented errors
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        $crate::errors::DpError::NotImplemented(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::errors::DpError::Config(format!($($arg)*))
    };
}
