use thiserror::Error;

/// Errors surfaced by the drawing engine.
///
/// Tolerated inputs (out-of-range layer indices, deleting the last layer,
/// strokes with fewer than two samples) never produce an error; they resolve
/// as no-ops. Errors are reserved for encode/decode failures and corrupt
/// persisted state.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("failed to encode layer raster: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to decode layer raster: {0}")]
    Decode(#[source] image::ImageError),

    #[error("invalid base64 raster data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid canvas state: {0}")]
    State(#[from] serde_json::Error),

    #[error("canvas state contains no layers")]
    EmptyState,
}

/// Result type for engine operations.
pub type CanvasResult<T> = Result<T, CanvasError>;
