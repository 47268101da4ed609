//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the render target layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize a backend.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// The native allocation returned no handle.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),
    /// A requested dimension is above the device maximum.
    #[error("dimension {requested} exceeds maximum {max}")]
    DimensionTooLarge {
        /// The dimension that was asked for.
        requested: u32,
        /// The largest dimension the factory will allocate.
        max: u32,
    },
    /// The surface backing a render target was lost.
    #[error("surface lost, needs recreation")]
    SurfaceLost,
    /// The native handle has already been released.
    #[error("resource already disposed")]
    Disposed,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The operation is not implemented for this resource kind.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// No stock shader is registered under the name.
    #[error("no stock shader named {0:?}")]
    ShaderNotFound(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::Disposed;
        assert_eq!(err.to_string(), "resource already disposed");

        let err = GraphicsError::DimensionTooLarge {
            requested: 9000,
            max: 8192,
        };
        assert_eq!(err.to_string(), "dimension 9000 exceeds maximum 8192");

        let err = GraphicsError::Unsupported("update() not supported for render targets");
        assert_eq!(
            err.to_string(),
            "unsupported operation: update() not supported for render targets"
        );
    }
}
