use crate::foundation::frame::PixelFormat;

/// Convenience result type used across hdrblend.
pub type BlendResult<T> = Result<T, BlendError>;

/// Top-level error taxonomy used by pool, blend, and engine APIs.
///
/// Every error is scoped to the call that produced it: pools and engines remain usable after any
/// of these is returned.
#[derive(thiserror::Error, Debug)]
pub enum BlendError {
    /// Invalid engine configuration (window size, weights, mode/window combination).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Frames in a window (or blend inputs) disagree on geometry.
    #[error(
        "dimension mismatch: frame {index} is {}x{}, expected {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    DimensionMismatch {
        /// Window slot (or blend input position) of the offending frame.
        index: usize,
        /// `(width, height)` of the reference frame.
        expected: (u32, u32),
        /// `(width, height)` of the offending frame.
        actual: (u32, u32),
    },

    /// A caller-supplied buffer is shorter than the operation requires.
    #[error("buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall {
        /// Minimum number of bytes the operation needs.
        required: usize,
        /// Number of bytes that were supplied.
        actual: usize,
    },

    /// A weight matrix has an invalid shape (or, when checked, invalid sums).
    #[error("invalid weight shape: {0}")]
    InvalidWeightShape(String),

    /// The codec backend could not construct an encoder or decoder handle.
    #[error("codec creation error: {0}")]
    CodecCreation(String),

    /// The codec backend failed to decode a frame.
    #[error("decode error: {0}")]
    Decode(String),

    /// The codec backend failed to encode a frame.
    #[error("encode error: {0}")]
    Encode(String),

    /// No valid image header could be read from the input bytes.
    #[error("header parse error: {0}")]
    HeaderParse(String),

    /// The pixel format cannot be used for the requested operation.
    #[error("unsupported format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    /// The frame source failed to produce bytes for a frame id.
    #[error("frame source error for frame {frame_id}: {source}")]
    Fetch {
        /// Frame id that was requested.
        frame_id: u64,
        /// Underlying source failure.
        #[source]
        source: anyhow::Error,
    },

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlendError {
    /// Build a [`BlendError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`BlendError::InvalidWeightShape`] value.
    pub fn weight_shape(msg: impl Into<String>) -> Self {
        Self::InvalidWeightShape(msg.into())
    }

    /// Build a [`BlendError::CodecCreation`] value.
    pub fn codec_creation(msg: impl Into<String>) -> Self {
        Self::CodecCreation(msg.into())
    }

    /// Build a [`BlendError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`BlendError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`BlendError::HeaderParse`] value.
    pub fn header_parse(msg: impl Into<String>) -> Self {
        Self::HeaderParse(msg.into())
    }

    /// Build a [`BlendError::BufferTooSmall`] value.
    pub fn buffer_too_small(required: usize, actual: usize) -> Self {
        Self::BufferTooSmall { required, actual }
    }

    /// Return `Err(BufferTooSmall)` when `actual < required`.
    pub fn ensure_len(required: usize, actual: usize) -> BlendResult<()> {
        if actual < required {
            return Err(Self::buffer_too_small(required, actual));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
