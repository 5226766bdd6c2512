use serde::{Deserialize, Serialize};

use crate::blend::weights::WeightMatrix;

/// How a window of frames is fused into one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Rounded per-byte mean.
    #[default]
    Average,
    /// Per-luminance Q0.8 weighting; the matrix's `num_frames` must match the window.
    Weighted(WeightMatrix),
    /// Three gray frames become the R, G and B channels of an interleaved RGB frame.
    GrayToRgb,
}

impl BlendMode {
    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Weighted(_) => "weighted",
            Self::GrayToRgb => "gray_to_rgb",
        }
    }

    /// Window size the mode is pinned to, if any.
    pub fn required_frames(&self) -> Option<usize> {
        match self {
            Self::Average => None,
            Self::Weighted(m) => Some(m.num_frames()),
            Self::GrayToRgb => Some(3),
        }
    }
}
