//! BT.601 full-range (JFIF) conversions in 16.16 fixed point.
//!
//! I420 layout: `[0, w*h)` Y, then `w*h/4` bytes U, then `w*h/4` bytes V. Chroma rows are
//! `w/2` bytes and there are `h/2` of them; for odd dimensions the tail of each chroma plane is
//! padding and holds 128.

use crate::foundation::frame::FrameHeader;

const ONE_HALF: i32 = 1 << 15;
const CHROMA_OFFSET: i32 = 128 << 16;

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// BT.601 luma of one RGB pixel.
#[inline]
pub fn rgb_to_y(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    clamp_u8((19595 * r + 38470 * g + 7471 * b + ONE_HALF) >> 16)
}

#[inline]
fn rgb_to_cb(r: i32, g: i32, b: i32) -> i32 {
    (-11059 * r - 21709 * g + 32768 * b + CHROMA_OFFSET + ONE_HALF) >> 16
}

#[inline]
fn rgb_to_cr(r: i32, g: i32, b: i32) -> i32 {
    (32768 * r - 27439 * g - 5329 * b + CHROMA_OFFSET + ONE_HALF) >> 16
}

/// Offsets of the U and V planes and the chroma row width/count.
pub(crate) fn chroma_layout(width: u32, height: u32) -> (usize, usize, usize, usize) {
    let luma = (width as usize) * (height as usize);
    (luma, luma + luma / 4, (width / 2) as usize, (height / 2) as usize)
}

/// Gray plane of packed RGB (`rgb.len() >= w*h*3`, `out.len() >= w*h`).
pub fn rgb_to_gray(rgb: &[u8], out: &mut [u8]) {
    for (px, o) in rgb.chunks_exact(3).zip(out.iter_mut()) {
        *o = rgb_to_y(px[0], px[1], px[2]);
    }
}

/// Packed RGB to I420; chroma is the rounded mean of each 2x2 block.
pub fn rgb_to_i420(rgb: &[u8], width: u32, height: u32, out: &mut [u8]) {
    let w = width as usize;
    let (u_off, v_off, cw, ch) = chroma_layout(width, height);
    let total = FrameHeader::i420_len(width, height);

    rgb_to_gray(rgb, &mut out[..u_off]);
    out[u_off..total].fill(128);

    for cy in 0..ch {
        for cx in 0..cw {
            let (mut cb, mut cr) = (0i32, 0i32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let i = ((cy * 2 + dy) * w + cx * 2 + dx) * 3;
                let (r, g, b) = (
                    i32::from(rgb[i]),
                    i32::from(rgb[i + 1]),
                    i32::from(rgb[i + 2]),
                );
                cb += rgb_to_cb(r, g, b);
                cr += rgb_to_cr(r, g, b);
            }
            out[u_off + cy * cw + cx] = clamp_u8((cb + 2) >> 2);
            out[v_off + cy * cw + cx] = clamp_u8((cr + 2) >> 2);
        }
    }
}

/// I420 to packed RGB (`out.len() >= w*h*3`), nearest chroma sample.
pub fn i420_to_rgb(i420: &[u8], width: u32, height: u32, out: &mut [u8]) {
    let w = width as usize;
    let (u_off, v_off, cw, ch) = chroma_layout(width, height);

    for (i, px) in out[..w * height as usize * 3].chunks_exact_mut(3).enumerate() {
        let (x, y) = (i % w, i / w);
        let (u, v) = if cw == 0 || ch == 0 {
            (128, 128)
        } else {
            let c = (y / 2).min(ch - 1) * cw + (x / 2).min(cw - 1);
            (i32::from(i420[u_off + c]), i32::from(i420[v_off + c]))
        };
        let yv = i32::from(i420[i]) << 16;
        let (cb, cr) = (u - 128, v - 128);
        px[0] = clamp_u8((yv + 91881 * cr + ONE_HALF) >> 16);
        px[1] = clamp_u8((yv - 22554 * cb - 46802 * cr + ONE_HALF) >> 16);
        px[2] = clamp_u8((yv + 116130 * cb + ONE_HALF) >> 16);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/yuv.rs"]
mod tests;
