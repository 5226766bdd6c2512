use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::blend::mode::BlendMode;
use crate::blend::weights::{MAX_FRAMES, MIN_FRAMES};
use crate::buffer::pool::BufferPoolOpts;
use crate::codec::backend::DctMethod;
use crate::codec::pool::CodecPoolOpts;
use crate::foundation::error::{BlendError, BlendResult};
use crate::foundation::frame::PixelFormat;

/// Options controlling [`HdrEngine`](crate::HdrEngine) window blending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per window, in `[2, 10]`. Slot `i` holds frame `frame_id - i`.
    pub window_count: usize,
    /// Blend algorithm.
    pub mode: BlendMode,
    /// JPEG quality of blended output, in `[1, 100]`.
    pub quality: u8,
    /// Layout frames are decoded to: [`PixelFormat::Gray8`] or [`PixelFormat::I420`].
    /// [`BlendMode::GrayToRgb`] always decodes gray.
    pub decode_format: PixelFormat,
    /// DCT method set on encoder handles.
    pub dct_method: DctMethod,
    /// Largest frame width codec handles accept.
    pub max_width: u32,
    /// Largest frame height codec handles accept.
    pub max_height: u32,
    /// Smallest output buffer handed to the encoder, in bytes. Grown to fit larger raw frames.
    pub encode_buffer_size: usize,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Retention limits of the engine's buffer pool.
    pub buffer_pool: BufferPoolOpts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_count: 2,
            mode: BlendMode::Average,
            quality: 90,
            decode_format: PixelFormat::I420,
            dct_method: DctMethod::Integer,
            max_width: 4096,
            max_height: 4096,
            encode_buffer_size: 4 * 1024 * 1024,
            threads: None,
            buffer_pool: BufferPoolOpts::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> BlendResult<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse engine config json")?;
        Ok(cfg)
    }

    /// Check window size, mode/window agreement, quality and resource limits.
    pub fn validate(&self) -> BlendResult<()> {
        let n = self.window_count;
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&n) {
            return Err(BlendError::configuration(format!(
                "window_count must be in [{MIN_FRAMES}, {MAX_FRAMES}], got {n}"
            )));
        }
        match &self.mode {
            BlendMode::Average => {}
            BlendMode::Weighted(m) if m.num_frames() != n => {
                return Err(BlendError::configuration(format!(
                    "weight matrix is built for {} frames but window_count is {n}",
                    m.num_frames()
                )));
            }
            BlendMode::Weighted(_) => {}
            BlendMode::GrayToRgb if n != 3 => {
                return Err(BlendError::configuration(format!(
                    "gray_to_rgb needs window_count 3, got {n}"
                )));
            }
            BlendMode::GrayToRgb => {}
        }
        if !(1..=100).contains(&self.quality) {
            return Err(BlendError::configuration(format!(
                "quality must be in [1, 100], got {}",
                self.quality
            )));
        }
        if !matches!(self.decode_format, PixelFormat::Gray8 | PixelFormat::I420) {
            return Err(BlendError::configuration(format!(
                "decode_format must be gray8 or i420, got {:?}",
                self.decode_format
            )));
        }
        if self.encode_buffer_size == 0 {
            return Err(BlendError::configuration("encode_buffer_size must be > 0"));
        }
        if self.threads == Some(0) {
            return Err(BlendError::configuration("threads must be >= 1 when set"));
        }
        Ok(())
    }

    /// Layout each window slot is decoded to.
    pub fn effective_decode_format(&self) -> PixelFormat {
        match self.mode {
            BlendMode::GrayToRgb => PixelFormat::Gray8,
            _ => self.decode_format,
        }
    }

    /// Codec pool options derived from this configuration.
    pub fn codec_pool_opts(&self) -> CodecPoolOpts {
        CodecPoolOpts {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            dct_method: self.dct_method,
            encode_buffer_size: self.encode_buffer_size,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/config.rs"]
mod tests;
