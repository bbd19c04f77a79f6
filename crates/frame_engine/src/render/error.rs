//! Renderer error taxonomy
//!
//! Only surface staleness is recovered inside the renderer (rebuild and skip the frame);
//! it never appears here. Everything else propagates to the application, which logs it
//! and shuts down.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::render::api::DeviceError;

/// Renderer errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU object could not be created
    #[error("Failed to create {resource}: {source}")]
    ResourceCreation {
        /// Kind of object that failed
        resource: &'static str,
        /// Backend cause
        #[source]
        source: DeviceError,
    },

    /// Mesh data that cannot be drawn
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A shader, model or terrain file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// I/O cause
        #[source]
        source: std::io::Error,
    },

    /// A shader, model or terrain file has invalid contents
    #[error("Malformed asset {path}: {reason}")]
    MalformedAsset {
        /// File that failed
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// Submission, presentation or another queue operation failed
    #[error("{operation} failed: {source}")]
    SubmitOrPresent {
        /// Operation that failed
        operation: &'static str,
        /// Backend cause
        #[source]
        source: DeviceError,
    },

    /// The device was lost; there is no recovery
    #[error("GPU device lost during {0}")]
    DeviceLost(&'static str),

    /// A fence wait exceeded the configured timeout
    #[error("Fence wait exceeded {0:?}; the GPU appears hung")]
    FenceTimeout(Duration),

    /// API misuse detected by the renderer
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Window creation or surface setup failed
    #[error("Window error: {0}")]
    Window(String),
}

impl RenderError {
    /// Map a backend error from an object-creation call
    pub fn creation(resource: &'static str, source: DeviceError) -> Self {
        match source {
            DeviceError::DeviceLost => Self::DeviceLost(resource),
            source => Self::ResourceCreation { resource, source },
        }
    }

    /// Map a backend error from a queue, wait or presentation call
    pub fn submission(operation: &'static str, source: DeviceError) -> Self {
        match source {
            DeviceError::DeviceLost => Self::DeviceLost(operation),
            source => Self::SubmitOrPresent { operation, source },
        }
    }

    /// Map a backend error from a fence wait bounded by `timeout`
    pub fn fence_wait(source: DeviceError, timeout: Option<Duration>) -> Self {
        match (source, timeout) {
            (DeviceError::Timeout, Some(timeout)) => Self::FenceTimeout(timeout),
            (source, _) => Self::submission("fence wait", source),
        }
    }
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
