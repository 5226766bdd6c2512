use serde::{Deserialize, Serialize};

/// DCT implementation requested from the encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DctMethod {
    /// Accurate integer DCT.
    #[default]
    Integer,
    /// Fastest available DCT, lower accuracy.
    Fast,
}

/// Header fields of a JPEG bitstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JpegInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of color components (1 for gray, 3 for color).
    pub components: u8,
}

/// Result of a successful decode call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes written to the output buffer. Zero means the backend failed.
    pub bytes_written: usize,
    /// Decoded width in pixels.
    pub width: u32,
    /// Decoded height in pixels.
    pub height: u32,
}

/// Parameters an encoder handle is constructed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Largest frame width the handle accepts.
    pub max_width: u32,
    /// Largest frame height the handle accepts.
    pub max_height: u32,
    /// JPEG quality in `[1, 100]`.
    pub quality: u8,
    /// DCT implementation.
    pub dct_method: DctMethod,
    /// Scratch size hint for compressed output.
    pub buffer_size: usize,
}

/// Bytes reserved for JPEG markers, quantization and Huffman tables.
const HEADER_ROOM: usize = 2048;

/// Opaque JPEG codec capability.
///
/// Handles are not thread-safe: one handle serves one call at a time, which the
/// [`CodecPool`](crate::CodecPool) guarantees. Byte-count results follow the native convention
/// where zero means failure; the pool maps both zero and `Err` to typed errors.
pub trait JpegBackend: Send + Sync + 'static {
    /// Encoder handle.
    type Encoder: Send + 'static;
    /// Decoder handle.
    type Decoder: Send + 'static;

    /// Construct an I420 encoder handle.
    fn create_encoder(&self, settings: &EncoderSettings) -> anyhow::Result<Self::Encoder>;
    /// Construct a decoder handle.
    fn create_decoder(&self, max_width: u32, max_height: u32) -> anyhow::Result<Self::Decoder>;
    /// Read dimensions and component count without decoding pixel data.
    fn read_header(&self, jpeg: &[u8]) -> anyhow::Result<JpegInfo>;
    /// Decode to 8-bit gray, row-major, stride == width.
    fn decode_gray(
        &self,
        decoder: &mut Self::Decoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded>;
    /// Decode to I420 (Y plane, then U, then V).
    fn decode_i420(
        &self,
        decoder: &mut Self::Decoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<Decoded>;
    /// One-shot gray encode; no handle needed.
    fn encode_gray(
        &self,
        width: u32,
        height: u32,
        quality: u8,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize>;
    /// Encode an I420 frame with a pooled handle.
    fn encode_i420(
        &self,
        encoder: &mut Self::Encoder,
        width: u32,
        height: u32,
        pixels: &[u8],
        out: &mut [u8],
    ) -> anyhow::Result<usize>;
    /// Change the quality of an encoder handle.
    fn set_quality(&self, encoder: &mut Self::Encoder, quality: u8);
    /// Change the DCT method of an encoder handle.
    fn set_dct_method(&self, encoder: &mut Self::Encoder, method: DctMethod);

    /// Largest compressed size an encode of `width`x`height` with `components` color components
    /// can produce.
    ///
    /// The default covers baseline JPEG with every component at full resolution: two bytes
    /// per sample over 16x16-padded dimensions plus room for markers and tables.
    fn max_encoded_len(&self, width: u32, height: u32, components: u8) -> usize {
        let padded = (width as usize)
            .next_multiple_of(16)
            .saturating_mul((height as usize).next_multiple_of(16));
        padded
            .saturating_mul(2 * usize::from(components))
            .saturating_add(HEADER_ROOM)
    }

    /// Destroy an encoder handle.
    fn close_encoder(&self, encoder: Self::Encoder) {
        drop(encoder);
    }

    /// Destroy a decoder handle.
    fn close_decoder(&self, decoder: Self::Decoder) {
        drop(decoder);
    }
}
