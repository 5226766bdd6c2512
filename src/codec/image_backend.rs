use std::io::Cursor;

use anyhow::{Context, ensure};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat};

use crate::codec::backend::{DctMethod, Decoded, EncoderSettings, JpegBackend, JpegInfo};
use crate::codec::yuv;
use crate::foundation::frame::FrameHeader;

/// JPEG codec backed by the `image` crate.
///
/// The `image` encoder has a single DCT implementation, so [`DctMethod`] is recorded on the
/// handle but does not change the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageJpegBackend;

impl ImageJpegBackend {
    /// New backend.
    pub fn new() -> Self {
        Self
    }
}

/// Encoder handle of [`ImageJpegBackend`]; owns RGB and bitstream scratch space.
#[derive(Debug)]
pub struct ImageJpegEncoder {
    settings: EncoderSettings,
    rgb: Vec<u8>,
    jpeg: Vec<u8>,
}

impl ImageJpegEncoder {
    /// Current quality.
    pub fn quality(&self) -> u8 {
        self.settings.quality
    }

    /// Recorded DCT method.
    pub fn dct_method(&self) -> DctMethod {
        self.settings.dct_method
    }
}

/// Decoder handle of [`ImageJpegBackend`].
#[derive(Debug)]
pub struct ImageJpegDecoder {
    max_width: u32,
    max_height: u32,
}

fn check_limits(width: u32, height: u32, max_width: u32, max_height: u32) -> anyhow::Result<()> {
    ensure!(
        width <= max_width && height <= max_height,
        "{width}x{height} exceeds handle limit {max_width}x{max_height}"
    );
    Ok(())
}

fn decode_image(jpeg: &[u8], decoder: &ImageJpegDecoder) -> anyhow::Result<DynamicImage> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .context("decode jpeg bitstream")?;
    check_limits(
        img.width(),
        img.height(),
        decoder.max_width,
        decoder.max_height,
    )?;
    Ok(img)
}

fn compress(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
    color: ExtendedColorType,
    sink: &mut Vec<u8>,
) -> anyhow::Result<()> {
    sink.clear();
    JpegEncoder::new_with_quality(&mut *sink, quality.clamp(1, 100))
        .encode(pixels, width, height, color)
        .context("encode jpeg bitstream")
}

fn copy_out(src: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
    ensure!(
        out.len() >= src.len(),
        "compressed frame is {} bytes, output holds {}",
        src.len(),
        out.len()
    );
    out[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

impl JpegBackend for ImageJpegBackend {
    type Encoder = ImageJpegEncoder;
    type Decoder = ImageJpegDecoder;

    fn create_encoder(&self, settings: &EncoderSettings) -> anyhow::Result<ImageJpegEncoder> {
        ensure!(
            settings.max_width > 0 && settings.max_height > 0,
            "encoder limits must be non-zero"
        );
        Ok(ImageJpegEncoder {
            settings: *settings,
            rgb: Vec::new(),
            jpeg: Vec::with_capacity(settings.buffer_size),
        })
    }

    fn create_decoder(&self, max_width: u32, max_height: u32) -> anyhow::Result<ImageJpegDecoder> {
        ensure!(
            max_width > 0 && max_height > 0,
            "decoder limits must be non-zero"
        );
        Ok(ImageJpegDecoder {
            max_width,
            max_height,
        })
    }

    fn read_header(&self, jpeg: &[u8]) -> anyhow::Result<JpegInfo> {
        let decoder = JpegDecoder::new(Cursor::new(jpeg)).context("read jpeg header")?;
        let (width, height) = decoder.dimensions();
        Ok(JpegInfo {
            width,
            height,
            components: decoder.color_type().channel_count(),
        })
    }

    fn decode_gray(
        &self,
        decoder: &mut ImageJpegDecoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded> {
        let img = decode_image(jpeg, decoder)?;
        let (width, height) = (img.width(), img.height());
        let len = FrameHeader::gray(width, height).len;
        ensure!(out.len() >= len, "gray output holds {} bytes, need {len}", out.len());

        match img {
            DynamicImage::ImageLuma8(buf) => out[..len].copy_from_slice(buf.as_raw()),
            other => yuv::rgb_to_gray(other.to_rgb8().as_raw(), &mut out[..len]),
        }
        Ok(Decoded {
            bytes_written: len,
            width,
            height,
        })
    }

    fn decode_i420(
        &self,
        decoder: &mut ImageJpegDecoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded> {
        let img = decode_image(jpeg, decoder)?;
        let (width, height) = (img.width(), img.height());
        let len = FrameHeader::i420_len(width, height);
        ensure!(out.len() >= len, "i420 output holds {} bytes, need {len}", out.len());

        match img {
            DynamicImage::ImageLuma8(buf) => {
                let luma = buf.as_raw().len();
                out[..luma].copy_from_slice(buf.as_raw());
                out[luma..len].fill(128);
            }
            other => yuv::rgb_to_i420(other.to_rgb8().as_raw(), width, height, out),
        }
        Ok(Decoded {
            bytes_written: len,
            width,
            height,
        })
    }

    fn encode_gray(
        &self,
        width: u32,
        height: u32,
        quality: u8,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize> {
        let len = FrameHeader::gray(width, height).len;
        ensure!(pixels.len() >= len, "gray input is shorter than {width}x{height}");
        let mut sink = Vec::new();
        compress(
            &pixels[..len],
            width,
            height,
            quality,
            ExtendedColorType::L8,
            &mut sink,
        )?;
        copy_out(&sink, out)
    }

    fn encode_i420(
        &self,
        encoder: &mut ImageJpegEncoder,
        width: u32,
        height: u32,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize> {
        check_limits(
            width,
            height,
            encoder.settings.max_width,
            encoder.settings.max_height,
        )?;
        ensure!(
            pixels.len() >= FrameHeader::i420_len(width, height),
            "i420 input is shorter than {width}x{height}"
        );
        let ImageJpegEncoder {
            settings,
            rgb,
            jpeg,
        } = encoder;
        rgb.resize(FrameHeader::rgb(width, height).len, 0);
        yuv::i420_to_rgb(pixels, width, height, rgb);
        compress(
            rgb,
            width,
            height,
            settings.quality,
            ExtendedColorType::Rgb8,
            jpeg,
        )?;
        copy_out(jpeg, out)
    }

    fn set_quality(&self, encoder: &mut ImageJpegEncoder, quality: u8) {
        encoder.settings.quality = quality;
    }

    fn set_dct_method(&self, encoder: &mut ImageJpegEncoder, method: DctMethod) {
        encoder.settings.dct_method = method;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/image_backend.rs"]
mod tests;
