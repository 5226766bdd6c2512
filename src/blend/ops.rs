//! Fixed-point blend kernels.
//!
//! Every routine writes into a caller-supplied buffer and returns the header describing what it
//! wrote. The arithmetic reproduces the reference plugin exactly: round-half-up means, Q0.8
//! multiply-shift weighting with a clamp at 255.

use std::ops::Range;

use crate::blend::mode::BlendMode;
use crate::blend::weights::{MAX_FRAMES, MIN_FRAMES, WeightMatrix};
use crate::foundation::error::{BlendError, BlendResult};
use crate::foundation::frame::{FrameHeader, FrameImage, PixelFormat};

/// `(a + b + 1) >> 1`.
#[inline]
pub fn average2_px(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + 1) >> 1) as u8
}

/// `(a + b + c + 1) / 3`.
#[inline]
pub fn average3_px(a: u8, b: u8, c: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + u16::from(c) + 1) / 3) as u8
}

/// `(sum + n/2) / n` over `samples`.
#[inline]
pub fn average_px(samples: &[u8]) -> u8 {
    let n = samples.len() as u16;
    let sum: u16 = samples.iter().map(|&v| u16::from(v)).sum();
    ((sum + n / 2) / n) as u8
}

/// Two-frame Q0.8 weighting against a 2-frame table of one channel.
///
/// `(a + b) & !1` is `2 * floor((a + b) / 2)`, i.e. the row of the mean luminance.
#[inline]
pub fn weighted2_px(a: u8, b: u8, table: &[u8]) -> u8 {
    let base = (usize::from(a) + usize::from(b)) & !1;
    let acc = u32::from(a) * u32::from(table[base]) + u32::from(b) * u32::from(table[base + 1]);
    (acc >> 8).min(255) as u8
}

/// N-frame Q0.8 weighting against a `256 * n` table of one channel.
#[inline]
pub fn weighted_px(samples: &[u8], table: &[u8]) -> u8 {
    let n = samples.len();
    let sum: u32 = samples.iter().map(|&v| u32::from(v)).sum();
    let base = (sum / n as u32) as usize * n;
    let acc: u32 = samples
        .iter()
        .enumerate()
        .map(|(f, &v)| u32::from(v) * u32::from(table[base + f]))
        .sum();
    (acc >> 8).min(255) as u8
}

const EMPTY: &[u8] = &[];

/// Validated view over 2..=10 frames that share one geometry.
struct Window<'a> {
    planes: [&'a [u8]; MAX_FRAMES],
    n: usize,
    header: FrameHeader,
}

impl<'a> Window<'a> {
    fn gather<'b: 'a, I>(frames: I) -> BlendResult<Self>
    where
        I: IntoIterator<Item = &'a FrameImage<'b>>,
    {
        let mut planes = [EMPTY; MAX_FRAMES];
        let mut header: Option<FrameHeader> = None;
        let mut n = 0usize;

        for (i, frame) in frames.into_iter().enumerate() {
            if i >= MAX_FRAMES {
                return Err(BlendError::configuration(format!(
                    "blend supports at most {MAX_FRAMES} frames"
                )));
            }
            match header {
                None => header = Some(*frame.header()),
                Some(h) if !frame.header().same_geometry(&h) => {
                    return Err(BlendError::DimensionMismatch {
                        index: i,
                        expected: h.dimensions(),
                        actual: frame.header().dimensions(),
                    });
                }
                Some(_) => {}
            }
            planes[i] = frame.data();
            n += 1;
        }

        let header = match header {
            Some(h) if n >= MIN_FRAMES => h,
            _ => {
                return Err(BlendError::configuration(format!(
                    "blend needs at least {MIN_FRAMES} frames, got {n}"
                )));
            }
        };
        Ok(Self { planes, n, header })
    }

    fn planes(&self) -> &[&'a [u8]] {
        &self.planes[..self.n]
    }

    fn out<'o>(&self, out: &'o mut [u8]) -> BlendResult<&'o mut [u8]> {
        BlendError::ensure_len(self.header.len, out.len())?;
        Ok(&mut out[..self.header.len])
    }
}

fn average_window(w: &Window<'_>, out: &mut [u8]) -> BlendResult<FrameHeader> {
    let out = w.out(out)?;
    match w.planes() {
        [a, b] => {
            for ((o, &a), &b) in out.iter_mut().zip(*a).zip(*b) {
                *o = average2_px(a, b);
            }
        }
        [a, b, c] => {
            for (((o, &a), &b), &c) in out.iter_mut().zip(*a).zip(*b).zip(*c) {
                *o = average3_px(a, b, c);
            }
        }
        planes => {
            let mut px = [0u8; MAX_FRAMES];
            for (i, o) in out.iter_mut().enumerate() {
                for (slot, plane) in px.iter_mut().zip(planes) {
                    *slot = plane[i];
                }
                *o = average_px(&px[..planes.len()]);
            }
        }
    }
    Ok(w.header)
}

fn weighted_range(w: &Window<'_>, range: Range<usize>, table: &[u8], out: &mut [u8]) {
    if let [a, b] = w.planes() {
        let (a, b) = (&a[range.clone()], &b[range.clone()]);
        for ((o, &a), &b) in out[range].iter_mut().zip(a).zip(b) {
            *o = weighted2_px(a, b, table);
        }
        return;
    }

    let planes = w.planes();
    let mut px = [0u8; MAX_FRAMES];
    for i in range {
        for (slot, plane) in px.iter_mut().zip(planes) {
            *slot = plane[i];
        }
        out[i] = weighted_px(&px[..planes.len()], table);
    }
}

fn weighted_window(
    w: &Window<'_>,
    weights: &WeightMatrix,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    if weights.num_frames() != w.n {
        return Err(BlendError::configuration(format!(
            "weight matrix is built for {} frames, got {}",
            weights.num_frames(),
            w.n
        )));
    }
    let len = w.header.len;
    let out = w.out(out)?;

    if weights.channels() == 3 && w.header.format == PixelFormat::I420 {
        let luma = (w.header.width as usize) * (w.header.height as usize);
        let chroma = luma / 4;
        weighted_range(w, 0..luma, weights.channel_slice(0), out);
        weighted_range(w, luma..luma + chroma, weights.channel_slice(1), out);
        weighted_range(w, luma + chroma..len, weights.channel_slice(2), out);
    } else {
        weighted_range(w, 0..len, weights.channel_slice(0), out);
    }
    Ok(w.header)
}

/// Rounded mean of two frames.
pub fn average2_into(
    a: &FrameImage<'_>,
    b: &FrameImage<'_>,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    average_window(&Window::gather([a, b])?, out)
}

/// Rounded mean of three frames.
pub fn average3_into(
    a: &FrameImage<'_>,
    b: &FrameImage<'_>,
    c: &FrameImage<'_>,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    average_window(&Window::gather([a, b, c])?, out)
}

/// Rounded mean of 2..=10 frames.
pub fn average_into(frames: &[FrameImage<'_>], out: &mut [u8]) -> BlendResult<FrameHeader> {
    average_window(&Window::gather(frames)?, out)
}

/// Two-frame luminance-weighted blend.
pub fn weighted2_into(
    a: &FrameImage<'_>,
    b: &FrameImage<'_>,
    weights: &WeightMatrix,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    weighted_window(&Window::gather([a, b])?, weights, out)
}

/// N-frame luminance-weighted blend; `weights.num_frames()` must equal `frames.len()`.
///
/// A 3-channel matrix applied to I420 frames weights the Y, U and V planes with channels 0, 1
/// and 2. Every other combination uses channel 0 for all bytes.
pub fn weighted_into(
    frames: &[FrameImage<'_>],
    weights: &WeightMatrix,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    weighted_window(&Window::gather(frames)?, weights, out)
}

/// Interleave three gray frames into one RGB frame: `out[3i..3i+3] = (r[i], g[i], b[i])`.
pub fn gray_to_rgb_into(
    r: &FrameImage<'_>,
    g: &FrameImage<'_>,
    b: &FrameImage<'_>,
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    let w = Window::gather([r, g, b])?;
    if w.header.format != PixelFormat::Gray8 {
        return Err(BlendError::UnsupportedFormat(w.header.format));
    }

    let width = w.header.width as usize;
    let stride = w.header.stride;
    let out_header = FrameHeader::rgb(w.header.width, w.header.height);
    BlendError::ensure_len(out_header.len, out.len())?;
    if out_header.len == 0 {
        return Ok(out_header);
    }

    let [r, g, b] = [w.planes[0], w.planes[1], w.planes[2]];
    for (y, dst) in out[..out_header.len]
        .chunks_exact_mut(out_header.stride)
        .enumerate()
    {
        let row = y * stride..y * stride + width;
        for (((px, &r), &g), &b) in dst
            .chunks_exact_mut(3)
            .zip(&r[row.clone()])
            .zip(&g[row.clone()])
            .zip(&b[row])
        {
            px.copy_from_slice(&[r, g, b]);
        }
    }
    Ok(out_header)
}

/// Header of the frame `mode` produces from `frames`.
pub fn output_header(mode: &BlendMode, frames: &[FrameImage<'_>]) -> BlendResult<FrameHeader> {
    let first = frames
        .first()
        .ok_or_else(|| BlendError::configuration("blend needs at least one frame"))?;
    Ok(match mode {
        BlendMode::Average | BlendMode::Weighted(_) => *first.header(),
        BlendMode::GrayToRgb => FrameHeader::rgb(first.width(), first.height()),
    })
}

/// Blend `frames` according to `mode`.
pub fn blend_into(
    mode: &BlendMode,
    frames: &[FrameImage<'_>],
    out: &mut [u8],
) -> BlendResult<FrameHeader> {
    match mode {
        BlendMode::Average => average_into(frames, out),
        BlendMode::Weighted(weights) => weighted_into(frames, weights, out),
        BlendMode::GrayToRgb => match frames {
            [r, g, b] => gray_to_rgb_into(r, g, b, out),
            _ => Err(BlendError::configuration(format!(
                "gray_to_rgb needs exactly 3 frames, got {}",
                frames.len()
            ))),
        },
    }
}

#[cfg(test)]
#[path = "../../tests/unit/blend/ops.rs"]
mod tests;
