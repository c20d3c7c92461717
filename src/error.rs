//! Error types for the reduction pipeline.

use std::fmt;

/// Result type alias for reduction operations.
pub type Result<T> = std::result::Result<T, ReduceError>;

/// Main error type for the reduction pipeline.
#[derive(Debug)]
pub enum ReduceError {
    /// Invalid or inconsistent configuration, reported before any output is written.
    Config(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Malformed or incomplete COCO JSON.
    Json(serde_json::Error),
    /// Image could not be opened or decoded.
    Image(String),
    /// Feature not compiled in.
    FeatureNotEnabled(String),
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
            Self::Image(msg) => write!(f, "Image error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for ReduceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReduceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ReduceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[cfg(feature = "laplacian")]
impl From<image::ImageError> for ReduceError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
