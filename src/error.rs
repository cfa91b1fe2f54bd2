use thiserror::Error;

use crate::cache::UploadTarget;

/// Library error type for image-wall operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A ring store was configured with zero slots.
    #[error("ring capacity must be greater than zero")]
    ZeroCapacity,

    /// A ring store was configured with zero slots per shard.
    #[error("shard capacity must be greater than zero")]
    ZeroShardCapacity,

    /// Raw bytes could not be decoded into an image.
    #[error(transparent)]
    Decode(#[from] image::ImageError),

    /// Resampling to the canonical size failed.
    #[error("resize failed: {0}")]
    Resize(String),

    /// The storage backend rejected a write.
    #[error("upload to {target} failed: {reason}")]
    Upload { target: UploadTarget, reason: String },

    /// An image does not match the canonical dimensions of the backend.
    #[error("image is {}x{}, expected {}x{}", actual.0, actual.1, expected.0, expected.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
