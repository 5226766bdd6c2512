//! Fixed-point frame blending.
//!
//! The arithmetic in [`ops`] is bit-exact: every routine is integer-only and rounds the same way
//! on every platform.

/// Blend mode selection.
pub mod mode;
/// Blend routines over raw frame buffers.
pub mod ops;
/// Per-luminance weight tables.
pub mod weights;
