use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::pool::PooledBuffer;
use crate::foundation::error::{BlendError, BlendResult};

/// Raw pixel buffer layout.
///
/// Only [`PixelFormat::Gray8`] and [`PixelFormat::I420`] travel through the decode/encode paths.
/// [`PixelFormat::Rgb24`] is produced by the gray-to-RGB blend. The remaining variants exist so
/// headers coming from other parts of a media pipeline can be described and rejected precisely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit single channel.
    Gray8,
    /// 4:2:0 planar: full-resolution Y plane followed by quarter-size U and V planes.
    I420,
    /// Interleaved 8-bit R, G, B.
    Rgb24,
    /// Interleaved 8-bit B, G, R.
    Bgr24,
    /// Interleaved 8-bit R, G, B, A.
    Rgba32,
    /// Interleaved 8-bit B, G, R, A.
    Bgra32,
    /// Packed 4:2:2 (Y0 U Y1 V).
    Yuy2,
}

impl PixelFormat {
    /// Bytes per pixel of the first (or only) plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 | Self::I420 => 1,
            Self::Yuy2 => 2,
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba32 | Self::Bgra32 => 4,
        }
    }

    /// Whether the layout stores chroma in separate planes.
    pub fn is_planar(self) -> bool {
        matches!(self, Self::I420)
    }
}

/// Geometry and layout of a raw (or encoded) frame buffer.
///
/// For raw frames `len` equals [`FrameHeader::expected_len`]. Encoded frames reuse the header of
/// the frame they were produced from with `len` replaced by the compressed size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row of the first plane.
    pub stride: usize,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Total buffer length in bytes.
    pub len: usize,
}

impl FrameHeader {
    /// Header for a tightly packed frame (`stride == width * bytes_per_pixel`).
    pub fn packed(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = (width as usize).saturating_mul(format.bytes_per_pixel());
        let mut header = Self {
            width,
            height,
            stride,
            format,
            len: 0,
        };
        header.len = header.expected_len();
        header
    }

    /// Header for a [`PixelFormat::Gray8`] frame.
    pub fn gray(width: u32, height: u32) -> Self {
        Self::packed(width, height, PixelFormat::Gray8)
    }

    /// Header for a [`PixelFormat::I420`] frame.
    pub fn i420(width: u32, height: u32) -> Self {
        Self::packed(width, height, PixelFormat::I420)
    }

    /// Header for a [`PixelFormat::Rgb24`] frame.
    pub fn rgb(width: u32, height: u32) -> Self {
        Self::packed(width, height, PixelFormat::Rgb24)
    }

    /// `w*h + 2*(w*h/4)`: luma plane plus two quarter-size chroma planes.
    pub fn i420_len(width: u32, height: u32) -> usize {
        let luma = (width as usize).saturating_mul(height as usize);
        luma.saturating_add(2 * (luma / 4))
    }

    /// Buffer length implied by width, height, stride and format.
    pub fn expected_len(&self) -> usize {
        match self.format {
            PixelFormat::I420 => Self::i420_len(self.width, self.height),
            _ => self.stride.saturating_mul(self.height as usize),
        }
    }

    /// Copy of this header with `len` replaced.
    pub fn with_len(self, len: usize) -> Self {
        Self { len, ..self }
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when width, height, format and length all agree.
    pub fn same_geometry(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.len == other.len
    }
}

/// Ownership of the bytes behind a [`FrameImage`].
pub enum FrameBytes<'a> {
    /// Caller keeps ownership; the image never releases it.
    Borrowed(&'a [u8]),
    /// Exclusively owned pooled allocation, handed back to its pool exactly once on drop.
    Pooled(PooledBuffer),
    /// Memory whose lifetime is managed outside the image.
    Shared(Arc<[u8]>),
}

impl FrameBytes<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Borrowed(b) => b,
            Self::Pooled(b) => b,
            Self::Shared(b) => b,
        }
    }
}

impl std::fmt::Debug for FrameBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Borrowed(_) => "Borrowed",
            Self::Pooled(_) => "Pooled",
            Self::Shared(_) => "Shared",
        };
        write!(f, "{kind}({} bytes)", self.as_slice().len())
    }
}

/// Raw or encoded pixel data tagged with a [`FrameHeader`].
#[derive(Debug)]
pub struct FrameImage<'a> {
    header: FrameHeader,
    bytes: FrameBytes<'a>,
}

impl<'a> FrameImage<'a> {
    /// Wrap caller-owned bytes. `data` must hold at least `header.len` bytes.
    pub fn borrowed(header: FrameHeader, data: &'a [u8]) -> BlendResult<Self> {
        BlendError::ensure_len(header.len, data.len())?;
        Ok(Self {
            header,
            bytes: FrameBytes::Borrowed(data),
        })
    }

    /// Frame header.
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.header.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.header.format
    }

    /// Exactly `header.len` bytes, regardless of the backing allocation's size.
    pub fn data(&self) -> &[u8] {
        &self.bytes.as_slice()[..self.header.len]
    }

    /// Ownership mode of the backing bytes.
    pub fn bytes(&self) -> &FrameBytes<'a> {
        &self.bytes
    }

    /// True when the image owns a pooled allocation.
    pub fn is_pooled(&self) -> bool {
        matches!(self.bytes, FrameBytes::Pooled(_))
    }

    /// Copy the visible bytes into a fresh `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }
}

impl FrameImage<'static> {
    /// Take exclusive ownership of a pooled buffer.
    pub fn pooled(header: FrameHeader, buf: PooledBuffer) -> BlendResult<Self> {
        BlendError::ensure_len(header.len, buf.len())?;
        Ok(Self {
            header,
            bytes: FrameBytes::Pooled(buf),
        })
    }

    /// Wrap externally managed memory.
    pub fn shared(header: FrameHeader, data: Arc<[u8]>) -> BlendResult<Self> {
        BlendError::ensure_len(header.len, data.len())?;
        Ok(Self {
            header,
            bytes: FrameBytes::Shared(data),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/frame.rs"]
mod tests;
