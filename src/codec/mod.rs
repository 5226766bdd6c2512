//! JPEG codec capability and the pooled handle manager built on it.
//!
//! [`backend::JpegBackend`] is the seam: the engine only talks to a [`pool::CodecPool`], which
//! hides handle construction cost and non-thread-safety behind lend/return.

/// Codec backend trait and shared value types.
pub mod backend;
/// Real backend over the `image` crate's JPEG codec.
pub mod image_backend;
/// Lossless in-memory backend for tests and debugging.
pub mod mock;
/// Thread-safe encoder/decoder handle pool.
pub mod pool;
/// BT.601 full-range RGB <-> I420 conversion.
pub mod yuv;
