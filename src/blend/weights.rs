use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{BlendError, BlendResult};

/// Smallest supported window.
pub const MIN_FRAMES: usize = 2;
/// Largest supported window.
pub const MAX_FRAMES: usize = 10;
/// Luminance levels addressed by a matrix (one per byte value).
pub const LUMA_LEVELS: usize = 256;

/// Per-luminance Q0.8 blend weights.
///
/// Layout: `weights[channel * 256 * num_frames + luminance * num_frames + frame]`. Each value is a
/// fraction of 255. Matrices built by the constructors on this type sum to exactly 255 across
/// frames for every `(channel, luminance)`; matrices built with [`WeightMatrix::from_raw`] are
/// expected to as well, but that is the caller's responsibility (see
/// [`WeightMatrix::check_normalized`]).
///
/// Cloning is cheap: the table is reference counted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WeightMatrixRepr", into = "WeightMatrixRepr")]
pub struct WeightMatrix {
    num_frames: usize,
    channels: usize,
    weights: Arc<[u8]>,
}

#[derive(Clone, Serialize, Deserialize)]
struct WeightMatrixRepr {
    num_frames: usize,
    #[serde(default = "default_channels")]
    channels: usize,
    weights: Vec<u8>,
}

fn default_channels() -> usize {
    1
}

impl TryFrom<WeightMatrixRepr> for WeightMatrix {
    type Error = BlendError;

    fn try_from(repr: WeightMatrixRepr) -> BlendResult<Self> {
        Self::from_raw(repr.weights, repr.num_frames, repr.channels)
    }
}

impl From<WeightMatrix> for WeightMatrixRepr {
    fn from(m: WeightMatrix) -> Self {
        Self {
            num_frames: m.num_frames,
            channels: m.channels,
            weights: m.weights.to_vec(),
        }
    }
}

fn check_shape(num_frames: usize, channels: usize) -> BlendResult<()> {
    if !(MIN_FRAMES..=MAX_FRAMES).contains(&num_frames) {
        return Err(BlendError::weight_shape(format!(
            "num_frames must be in [{MIN_FRAMES}, {MAX_FRAMES}], got {num_frames}"
        )));
    }
    if channels != 1 && channels != 3 {
        return Err(BlendError::weight_shape(format!(
            "channels must be 1 or 3, got {channels}"
        )));
    }
    Ok(())
}

impl WeightMatrix {
    /// Wrap an externally supplied table.
    ///
    /// Validates `weights.len() == channels * 256 * num_frames`, `num_frames` in `[2, 10]` and
    /// `channels` in `{1, 3}`. Per-luminance sums are not checked; use
    /// [`WeightMatrix::from_raw_normalized`] to enforce them.
    pub fn from_raw(weights: Vec<u8>, num_frames: usize, channels: usize) -> BlendResult<Self> {
        check_shape(num_frames, channels)?;
        let expected = channels * LUMA_LEVELS * num_frames;
        if weights.len() != expected {
            return Err(BlendError::weight_shape(format!(
                "expected {expected} weights for {channels} channel(s) x {num_frames} frames, got {}",
                weights.len()
            )));
        }
        Ok(Self {
            num_frames,
            channels,
            weights: weights.into(),
        })
    }

    /// [`WeightMatrix::from_raw`] followed by [`WeightMatrix::check_normalized`].
    pub fn from_raw_normalized(
        weights: Vec<u8>,
        num_frames: usize,
        channels: usize,
    ) -> BlendResult<Self> {
        let m = Self::from_raw(weights, num_frames, channels)?;
        m.check_normalized()?;
        Ok(m)
    }

    /// Equal weights: `255 / n` per frame, the last frame takes the remainder.
    pub fn equal(num_frames: usize, channels: usize) -> BlendResult<Self> {
        check_shape(num_frames, channels)?;
        let share = (255 / num_frames) as u8;
        let last = 255 - share * (num_frames as u8 - 1);

        let mut weights = Vec::with_capacity(channels * LUMA_LEVELS * num_frames);
        for _ in 0..channels * LUMA_LEVELS {
            weights.extend(std::iter::repeat_n(share, num_frames - 1));
            weights.push(last);
        }
        Self::from_raw(weights, num_frames, channels)
    }

    /// Two-frame ramp: frame 0 gets `255 - L`, frame 1 gets `L`.
    ///
    /// Dark pixels favor frame 0, bright pixels favor frame 1.
    pub fn linear_2frame() -> Self {
        Self::ramp_2frame(false)
    }

    /// Mirror of [`WeightMatrix::linear_2frame`]: frame 0 gets `L`, frame 1 gets `255 - L`.
    pub fn inverse_linear_2frame() -> Self {
        Self::ramp_2frame(true)
    }

    fn ramp_2frame(inverse: bool) -> Self {
        let mut weights = Vec::with_capacity(LUMA_LEVELS * 2);
        for l in 0..=255u8 {
            let (w0, w1) = if inverse { (l, 255 - l) } else { (255 - l, l) };
            weights.push(w0);
            weights.push(w1);
        }
        Self {
            num_frames: 2,
            channels: 1,
            weights: weights.into(),
        }
    }

    /// Number of frames the matrix blends.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Number of weight channels (1 or 3).
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Flat index of `(luminance, frame_index, channel)`.
    pub fn weight_index(&self, luminance: u8, frame_index: usize, channel: usize) -> usize {
        channel * LUMA_LEVELS * self.num_frames
            + usize::from(luminance) * self.num_frames
            + frame_index
    }

    /// Weight for `(luminance, frame_index, channel)`.
    ///
    /// # Panics
    ///
    /// Panics if `frame_index >= num_frames` or `channel >= channels`.
    pub fn weight(&self, luminance: u8, frame_index: usize, channel: usize) -> u8 {
        assert!(frame_index < self.num_frames, "frame index out of range");
        assert!(channel < self.channels, "channel out of range");
        self.weights[self.weight_index(luminance, frame_index, channel)]
    }

    /// The `256 * num_frames` table of one channel, indexed `luminance * num_frames + frame`.
    ///
    /// Channels past the last fall back to channel 0.
    pub fn channel_slice(&self, channel: usize) -> &[u8] {
        let channel = if channel < self.channels { channel } else { 0 };
        let len = LUMA_LEVELS * self.num_frames;
        &self.weights[channel * len..(channel + 1) * len]
    }

    /// The whole table.
    pub fn as_slice(&self) -> &[u8] {
        &self.weights
    }

    /// Check that every `(channel, luminance)` row sums to 255.
    pub fn check_normalized(&self) -> BlendResult<()> {
        for channel in 0..self.channels {
            for (l, row) in self
                .channel_slice(channel)
                .chunks_exact(self.num_frames)
                .enumerate()
            {
                let sum: u32 = row.iter().map(|&w| u32::from(w)).sum();
                if sum != 255 {
                    return Err(BlendError::weight_shape(format!(
                        "weights for channel {channel}, luminance {l} sum to {sum}, expected 255"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/blend/weights.rs"]
mod tests;
