/// Error taxonomy and result alias.
pub mod error;
/// Pixel formats, frame headers and frame images.
pub mod frame;
