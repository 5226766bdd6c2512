//! Producers of compressed frames.
//!
//! The engine pulls one JPEG per window slot through a [`frame_source::FrameSource`].

/// Frame source trait and built-in sources.
pub mod frame_source;
