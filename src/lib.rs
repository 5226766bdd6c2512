//! hdrblend fuses sliding windows of JPEG video frames into higher-dynamic-range frames.
//!
//! The public API is engine-oriented:
//!
//! - Configure an [`EngineConfig`] (window size, [`BlendMode`], output quality)
//! - Create an [`HdrEngine`] over a [`JpegBackend`] and a [`FrameSource`]
//! - Call [`HdrEngine::get`] (or [`HdrEngine::get_async`]) per target frame id
//!
//! The blend routines in [`blend::ops`] and the pools in [`codec::pool`] and [`buffer::pool`]
//! are usable on their own.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Fixed-point blend routines, modes and weight tables.
pub mod blend;
/// Pooled byte buffers.
pub mod buffer;
/// JPEG backends and the codec handle pool.
pub mod codec;
/// Window orchestration engine.
pub mod engine;
/// Errors, pixel formats and frame images.
pub mod foundation;
/// Frame sources.
pub mod source;

pub use crate::blend::mode::BlendMode;
pub use crate::blend::weights::WeightMatrix;
pub use crate::buffer::pool::{BufferPool, BufferPoolOpts, BufferPoolStats, PooledBuffer};
pub use crate::codec::backend::{DctMethod, Decoded, EncoderSettings, JpegBackend, JpegInfo};
pub use crate::codec::image_backend::ImageJpegBackend;
pub use crate::codec::mock::MockJpegBackend;
pub use crate::codec::pool::{CodecPool, CodecPoolOpts, CodecPoolStats};
pub use crate::engine::config::EngineConfig;
pub use crate::engine::hdr_engine::{EngineStats, HdrEngine};
pub use crate::foundation::error::{BlendError, BlendResult};
pub use crate::foundation::frame::{FrameBytes, FrameHeader, FrameImage, PixelFormat};
pub use crate::source::frame_source::{FrameSource, InMemoryFrameSource};
