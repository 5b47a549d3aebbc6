//! Unified error handling for the route-risk pipeline.
//!
//! Validation failures (bad coordinates, malformed rider context, missing start time) are
//! separated from processing failures in the rendering and report collaborators so callers
//! can tell "bad input" apart from "environment problem".

use std::fmt;

/// Unified error type for route-risk operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskError {
    /// Fewer usable coordinates than the pipeline needs
    InsufficientData {
        point_count: usize,
        minimum_required: usize,
    },
    /// A request field is out of range or malformed
    InvalidParameter { field: String, message: String },
    /// Weather lookup failed (recovered with a default reading by the resolver)
    WeatherUnavailable { message: String },
    /// Map rendering collaborator failed
    RenderingFailure { message: String },
    /// Report templating collaborator failed
    ReportFailure { message: String },
    /// Configuration error
    ConfigError { message: String },
}

impl RiskError {
    /// Shorthand for an [`RiskError::InvalidParameter`] naming the offending field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        RiskError::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RiskError::InsufficientData { .. } | RiskError::InvalidParameter { .. }
        )
    }
}

impl fmt::Display for RiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskError::InsufficientData {
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "Track has {} usable points, minimum {} required",
                    point_count, minimum_required
                )
            }
            RiskError::InvalidParameter { field, message } => {
                write!(f, "Invalid parameter '{}': {}", field, message)
            }
            RiskError::WeatherUnavailable { message } => {
                write!(f, "Weather unavailable: {}", message)
            }
            RiskError::RenderingFailure { message } => {
                write!(f, "Processing error (map rendering): {}", message)
            }
            RiskError::ReportFailure { message } => {
                write!(f, "Processing error (report): {}", message)
            }
            RiskError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for RiskError {}

/// Result type alias for route-risk operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Extension trait for converting Option to RiskError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid parameter error for `field`.
    fn ok_or_invalid(self, field: &str, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid(self, field: &str, message: &str) -> Result<T> {
        self.ok_or_else(|| RiskError::invalid(field, message))
    }
}
