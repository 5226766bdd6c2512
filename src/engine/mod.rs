//! Window orchestration: fetch, decode, blend, encode.
//!
//! [`hdr_engine::HdrEngine`] composes a [`crate::FrameSource`], a pooled JPEG codec and the
//! blend routines.

/// Serde-backed engine configuration.
pub mod config;
/// The engine and its request statistics.
pub mod hdr_engine;
