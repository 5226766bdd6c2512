use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, bail, ensure};

use crate::codec::backend::{DctMethod, Decoded, EncoderSettings, JpegBackend, JpegInfo};
use crate::foundation::frame::FrameHeader;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const MAGIC: [u8; 2] = *b"HB";
const HEADER_LEN: usize = 2 + 2 + 1 + 4 + 4;

#[derive(Default)]
struct MockState {
    encoders_created: AtomicUsize,
    decoders_created: AtomicUsize,
    encoders_closed: AtomicUsize,
    decoders_closed: AtomicUsize,
    decodes: AtomicUsize,
    encodes: AtomicUsize,
    fail_encoder_creation: AtomicBool,
    fail_decoder_creation: AtomicBool,
}

/// Lossless in-memory codec for tests and debugging.
///
/// "JPEG" bytes are a tiny container: `FF D8`, `"HB"`, component count, little-endian width
/// and height, the raw Gray8 or I420 payload, `FF D9`. Decoding returns exactly what was
/// encoded, so blended output can be checked byte for byte after a full pipeline run.
///
/// Clones share counters, so a clone kept by a test observes handles created by a pool that
/// owns another clone.
#[derive(Clone, Default)]
pub struct MockJpegBackend {
    state: Arc<MockState>,
}

/// Encoder handle of [`MockJpegBackend`].
#[derive(Debug)]
pub struct MockEncoder {
    settings: EncoderSettings,
}

impl MockEncoder {
    /// Current quality.
    pub fn quality(&self) -> u8 {
        self.settings.quality
    }

    /// Current DCT method.
    pub fn dct_method(&self) -> DctMethod {
        self.settings.dct_method
    }
}

/// Decoder handle of [`MockJpegBackend`].
#[derive(Debug)]
pub struct MockDecoder {
    max_width: u32,
    max_height: u32,
}

impl MockJpegBackend {
    /// New backend with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container bytes for a gray frame.
    pub fn gray_jpeg(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        container(1, width, height, pixels)
    }

    /// Container bytes for an I420 frame.
    pub fn i420_jpeg(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        container(3, width, height, pixels)
    }

    /// Make subsequent encoder constructions fail.
    pub fn set_fail_encoder_creation(&self, fail: bool) {
        self.state.fail_encoder_creation.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent decoder constructions fail.
    pub fn set_fail_decoder_creation(&self, fail: bool) {
        self.state.fail_decoder_creation.store(fail, Ordering::SeqCst);
    }

    /// Encoder handles constructed so far.
    pub fn encoders_created(&self) -> usize {
        self.state.encoders_created.load(Ordering::SeqCst)
    }

    /// Decoder handles constructed so far.
    pub fn decoders_created(&self) -> usize {
        self.state.decoders_created.load(Ordering::SeqCst)
    }

    /// Encoder handles closed so far.
    pub fn encoders_closed(&self) -> usize {
        self.state.encoders_closed.load(Ordering::SeqCst)
    }

    /// Decoder handles closed so far.
    pub fn decoders_closed(&self) -> usize {
        self.state.decoders_closed.load(Ordering::SeqCst)
    }

    /// Decode calls served so far.
    pub fn decodes(&self) -> usize {
        self.state.decodes.load(Ordering::SeqCst)
    }

    /// Encode calls served so far.
    pub fn encodes(&self) -> usize {
        self.state.encodes.load(Ordering::SeqCst)
    }
}

fn container(components: u8, width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + pixels.len() + EOI.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&MAGIC);
    out.push(components);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(pixels);
    out.extend_from_slice(&EOI);
    out
}

fn payload_len(components: u8, width: u32, height: u32) -> anyhow::Result<usize> {
    match components {
        1 => Ok(FrameHeader::gray(width, height).len),
        3 => Ok(FrameHeader::i420_len(width, height)),
        n => bail!("unsupported component count {n}"),
    }
}

fn parse(jpeg: &[u8]) -> anyhow::Result<(JpegInfo, &[u8])> {
    ensure!(jpeg.len() >= HEADER_LEN + EOI.len(), "truncated mock jpeg");
    ensure!(jpeg[..2] == SOI && jpeg[2..4] == MAGIC, "missing SOI marker");
    let components = jpeg[4];
    let width = u32::from_le_bytes(jpeg[5..9].try_into().context("width field")?);
    let height = u32::from_le_bytes(jpeg[9..13].try_into().context("height field")?);
    let len = payload_len(components, width, height)?;
    let end = HEADER_LEN
        .checked_add(len)
        .context("payload length overflows")?;
    let payload = jpeg
        .get(HEADER_LEN..end)
        .context("payload shorter than header claims")?;
    ensure!(jpeg[end..] == EOI, "missing EOI marker after payload");
    Ok((
        JpegInfo {
            width,
            height,
            components,
        },
        payload,
    ))
}

fn copy_out(src: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
    ensure!(
        out.len() >= src.len(),
        "output buffer holds {} bytes, need {}",
        out.len(),
        src.len()
    );
    out[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

impl MockDecoder {
    fn check(&self, info: &JpegInfo) -> anyhow::Result<()> {
        ensure!(
            info.width <= self.max_width && info.height <= self.max_height,
            "{}x{} exceeds decoder limit {}x{}",
            info.width,
            info.height,
            self.max_width,
            self.max_height
        );
        Ok(())
    }
}

impl JpegBackend for MockJpegBackend {
    type Encoder = MockEncoder;
    type Decoder = MockDecoder;

    fn create_encoder(&self, settings: &EncoderSettings) -> anyhow::Result<MockEncoder> {
        if self.state.fail_encoder_creation.load(Ordering::SeqCst) {
            bail!("mock encoder backend unavailable");
        }
        self.state.encoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(MockEncoder {
            settings: *settings,
        })
    }

    fn create_decoder(&self, max_width: u32, max_height: u32) -> anyhow::Result<MockDecoder> {
        if self.state.fail_decoder_creation.load(Ordering::SeqCst) {
            bail!("mock decoder backend unavailable");
        }
        self.state.decoders_created.fetch_add(1, Ordering::SeqCst);
        Ok(MockDecoder {
            max_width,
            max_height,
        })
    }

    fn read_header(&self, jpeg: &[u8]) -> anyhow::Result<JpegInfo> {
        parse(jpeg).map(|(info, _)| info)
    }

    fn decode_gray(
        &self,
        decoder: &mut MockDecoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded> {
        let (info, payload) = parse(jpeg)?;
        decoder.check(&info)?;
        self.state.decodes.fetch_add(1, Ordering::SeqCst);
        // Both layouts start with a full-resolution luma plane.
        let luma = (info.width as usize) * (info.height as usize);
        let bytes_written = copy_out(&payload[..luma], out)?;
        Ok(Decoded {
            bytes_written,
            width: info.width,
            height: info.height,
        })
    }

    fn decode_i420(
        &self,
        decoder: &mut MockDecoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded> {
        let (info, payload) = parse(jpeg)?;
        decoder.check(&info)?;
        self.state.decodes.fetch_add(1, Ordering::SeqCst);
        let total = FrameHeader::i420_len(info.width, info.height);
        ensure!(
            out.len() >= total,
            "output buffer holds {} bytes, need {total}",
            out.len()
        );
        let bytes_written = if info.components == 3 {
            copy_out(payload, out)?
        } else {
            let luma = copy_out(payload, out)?;
            out[luma..total].fill(128);
            total
        };
        Ok(Decoded {
            bytes_written,
            width: info.width,
            height: info.height,
        })
    }

    fn encode_gray(
        &self,
        width: u32,
        height: u32,
        _quality: u8,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize> {
        let len = FrameHeader::gray(width, height).len;
        ensure!(pixels.len() >= len, "gray input is shorter than {width}x{height}");
        self.state.encodes.fetch_add(1, Ordering::SeqCst);
        copy_out(&container(1, width, height, &pixels[..len]), out)
    }

    fn encode_i420(
        &self,
        encoder: &mut MockEncoder,
        width: u32,
        height: u32,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize> {
        ensure!(
            width <= encoder.settings.max_width && height <= encoder.settings.max_height,
            "{width}x{height} exceeds encoder limit"
        );
        let len = FrameHeader::i420_len(width, height);
        ensure!(pixels.len() >= len, "i420 input is shorter than {width}x{height}");
        self.state.encodes.fetch_add(1, Ordering::SeqCst);
        copy_out(&container(3, width, height, &pixels[..len]), out)
    }

    fn set_quality(&self, encoder: &mut MockEncoder, quality: u8) {
        encoder.settings.quality = quality;
    }

    fn set_dct_method(&self, encoder: &mut MockEncoder, method: DctMethod) {
        encoder.settings.dct_method = method;
    }

    fn close_encoder(&self, encoder: MockEncoder) {
        self.state.encoders_closed.fetch_add(1, Ordering::SeqCst);
        drop(encoder);
    }

    fn close_decoder(&self, decoder: MockDecoder) {
        self.state.decoders_closed.fetch_add(1, Ordering::SeqCst);
        drop(decoder);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/mock.rs"]
mod tests;
