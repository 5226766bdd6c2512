use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::codec::backend::{DctMethod, EncoderSettings, JpegBackend};
use crate::foundation::error::{BlendError, BlendResult};
use crate::foundation::frame::FrameHeader;

/// Construction options for pooled codec handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecPoolOpts {
    /// Largest frame width a handle must accept.
    pub max_width: u32,
    /// Largest frame height a handle must accept.
    pub max_height: u32,
    /// Initial encoder quality in `[1, 100]`.
    pub quality: u8,
    /// Initial encoder DCT method.
    pub dct_method: DctMethod,
    /// Scratch size hint for compressed output.
    pub encode_buffer_size: usize,
}

impl Default for CodecPoolOpts {
    fn default() -> Self {
        Self {
            max_width: 4096,
            max_height: 4096,
            quality: 90,
            dct_method: DctMethod::Integer,
            encode_buffer_size: 4 * 1024 * 1024,
        }
    }
}

impl CodecPoolOpts {
    /// Settings passed to [`JpegBackend::create_encoder`].
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            dct_method: self.dct_method,
            buffer_size: self.encode_buffer_size,
        }
    }
}

/// Counters for one handle kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandleStats {
    /// Handles constructed by the backend.
    pub created: u64,
    /// Handles destroyed by the pool.
    pub closed: u64,
    /// Handles idle in the pool.
    pub idle: usize,
    /// Handles currently rented out.
    pub lent: usize,
    /// Most handles ever rented out at the same time.
    pub peak_lent: usize,
}

/// Snapshot of [`CodecPool`] counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CodecPoolStats {
    /// Encoder counters.
    pub encoders: HandleStats,
    /// Decoder counters.
    pub decoders: HandleStats,
    /// Whether [`CodecPool::shutdown`] has run.
    pub shut_down: bool,
}

struct Slots<H> {
    idle: Vec<H>,
    stats: HandleStats,
}

impl<H> Default for Slots<H> {
    fn default() -> Self {
        Self {
            idle: Vec::new(),
            stats: HandleStats::default(),
        }
    }
}

impl<H> Slots<H> {
    fn lend(&mut self) {
        self.stats.lent = self.stats.lent.saturating_add(1);
        self.stats.peak_lent = self.stats.peak_lent.max(self.stats.lent);
    }

    fn unlend(&mut self) {
        self.stats.lent = self.stats.lent.saturating_sub(1);
    }

    fn snapshot(&self) -> HandleStats {
        HandleStats {
            idle: self.idle.len(),
            ..self.stats
        }
    }
}

struct PoolState<B: JpegBackend> {
    encoders: Slots<B::Encoder>,
    decoders: Slots<B::Decoder>,
    shut_down: bool,
}

/// Thread-safe pool of JPEG encoder and decoder handles.
///
/// A handle is owned by exactly one caller between rent and return. The idle sets grow on
/// demand and are never trimmed, so their size tracks peak concurrency. Backend construction
/// runs outside the lock; a caller counts as lent from the moment it starts constructing.
pub struct CodecPool<B: JpegBackend> {
    backend: B,
    opts: CodecPoolOpts,
    state: Mutex<PoolState<B>>,
}

impl<B: JpegBackend> CodecPool<B> {
    /// Create an empty pool over `backend`.
    pub fn new(backend: B, opts: CodecPoolOpts) -> Self {
        Self {
            backend,
            opts,
            state: Mutex::new(PoolState {
                encoders: Slots::default(),
                decoders: Slots::default(),
                shut_down: false,
            }),
        }
    }

    /// Backend the pool creates handles with.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Options handles are constructed with.
    pub fn opts(&self) -> CodecPoolOpts {
        self.opts
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> CodecPoolStats {
        let st = self.state.lock();
        CodecPoolStats {
            encoders: st.encoders.snapshot(),
            decoders: st.decoders.snapshot(),
            shut_down: st.shut_down,
        }
    }

    /// Take an idle encoder, or construct one when none is idle.
    pub fn rent_encoder(&self) -> BlendResult<B::Encoder> {
        {
            let mut st = self.state.lock();
            if st.shut_down {
                return Err(BlendError::codec_creation("codec pool is shut down"));
            }
            let reused = st.encoders.idle.pop();
            st.encoders.lend();
            if let Some(h) = reused {
                return Ok(h);
            }
        }

        let created = self.backend.create_encoder(&self.opts.encoder_settings());
        let mut st = self.state.lock();
        match created {
            Ok(h) => {
                st.encoders.stats.created = st.encoders.stats.created.saturating_add(1);
                tracing::debug!(created = st.encoders.stats.created, "created jpeg encoder");
                Ok(h)
            }
            Err(e) => {
                st.encoders.unlend();
                Err(BlendError::codec_creation(format!("encoder: {e:#}")))
            }
        }
    }

    /// Take an idle decoder, or construct one when none is idle.
    pub fn rent_decoder(&self) -> BlendResult<B::Decoder> {
        {
            let mut st = self.state.lock();
            if st.shut_down {
                return Err(BlendError::codec_creation("codec pool is shut down"));
            }
            let reused = st.decoders.idle.pop();
            st.decoders.lend();
            if let Some(h) = reused {
                return Ok(h);
            }
        }

        let created = self.backend.create_decoder(self.opts.max_width, self.opts.max_height);
        let mut st = self.state.lock();
        match created {
            Ok(h) => {
                st.decoders.stats.created = st.decoders.stats.created.saturating_add(1);
                tracing::debug!(created = st.decoders.stats.created, "created jpeg decoder");
                Ok(h)
            }
            Err(e) => {
                st.decoders.unlend();
                Err(BlendError::codec_creation(format!("decoder: {e:#}")))
            }
        }
    }

    /// Give an encoder back. After shutdown the handle is closed instead.
    pub fn return_encoder(&self, handle: B::Encoder) {
        let mut st = self.state.lock();
        st.encoders.unlend();
        if !st.shut_down {
            st.encoders.idle.push(handle);
            return;
        }
        st.encoders.stats.closed = st.encoders.stats.closed.saturating_add(1);
        drop(st);
        tracing::warn!("encoder returned after shutdown; closing");
        self.backend.close_encoder(handle);
    }

    /// Give a decoder back. After shutdown the handle is closed instead.
    pub fn return_decoder(&self, handle: B::Decoder) {
        let mut st = self.state.lock();
        st.decoders.unlend();
        if !st.shut_down {
            st.decoders.idle.push(handle);
            return;
        }
        st.decoders.stats.closed = st.decoders.stats.closed.saturating_add(1);
        drop(st);
        tracing::warn!("decoder returned after shutdown; closing");
        self.backend.close_decoder(handle);
    }

    /// Rent an encoder that returns itself when the lease drops.
    pub fn lease_encoder(&self) -> BlendResult<EncoderLease<'_, B>> {
        Ok(EncoderLease {
            pool: self,
            handle: Some(self.rent_encoder()?),
        })
    }

    /// Rent a decoder that returns itself when the lease drops.
    pub fn lease_decoder(&self) -> BlendResult<DecoderLease<'_, B>> {
        Ok(DecoderLease {
            pool: self,
            handle: Some(self.rent_decoder()?),
        })
    }

    /// Read dimensions from a JPEG header without decoding pixels.
    ///
    /// One component yields a Gray8 header, three an I420 header.
    pub fn get_image_info(&self, jpeg: &[u8]) -> BlendResult<FrameHeader> {
        let info = self
            .backend
            .read_header(jpeg)
            .map_err(|e| BlendError::header_parse(format!("{e:#}")))?;
        match info.components {
            1 => Ok(FrameHeader::gray(info.width, info.height)),
            3 => Ok(FrameHeader::i420(info.width, info.height)),
            n => Err(BlendError::header_parse(format!(
                "unsupported component count {n}"
            ))),
        }
    }

    /// Decode to Gray8 into `out`.
    pub fn decode_gray(
        &self,
        handle: &mut B::Decoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> BlendResult<FrameHeader> {
        let info = self.get_image_info(jpeg)?;
        let header = FrameHeader::gray(info.width, info.height);
        BlendError::ensure_len(header.len, out.len())?;
        let decoded = self
            .backend
            .decode_gray(handle, jpeg, out)
            .map_err(|e| BlendError::decode(format!("{e:#}")))?;
        if decoded.bytes_written == 0 {
            return Err(BlendError::decode("backend wrote no gray bytes"));
        }
        Ok(FrameHeader::gray(decoded.width, decoded.height))
    }

    /// Decode to I420 into `out`.
    pub fn decode_subsampled(
        &self,
        handle: &mut B::Decoder,
        jpeg: &[u8],
        out: &mut [u8],
    ) -> BlendResult<FrameHeader> {
        let info = self.get_image_info(jpeg)?;
        let header = FrameHeader::i420(info.width, info.height);
        BlendError::ensure_len(header.len, out.len())?;
        let decoded = self
            .backend
            .decode_i420(handle, jpeg, out)
            .map_err(|e| BlendError::decode(format!("{e:#}")))?;
        if decoded.bytes_written == 0 {
            return Err(BlendError::decode("backend wrote no i420 bytes"));
        }
        Ok(FrameHeader::i420(decoded.width, decoded.height))
    }

    /// Encode an I420 frame with `handle`; returns compressed bytes written to `out`.
    pub fn encode_subsampled(
        &self,
        handle: &mut B::Encoder,
        width: u32,
        height: u32,
        pixels: &[u8],
        out: &mut [u8],
    ) -> BlendResult<usize> {
        BlendError::ensure_len(FrameHeader::i420_len(width, height), pixels.len())?;
        let n = self
            .backend
            .encode_i420(handle, width, height, pixels, out)
            .map_err(|e| BlendError::encode(format!("{e:#}")))?;
        if n == 0 {
            return Err(BlendError::encode("backend wrote no i420 jpeg bytes"));
        }
        Ok(n)
    }

    /// One-shot Gray8 encode at `quality`; returns compressed bytes written to `out`.
    pub fn encode_gray(
        &self,
        width: u32,
        height: u32,
        quality: u8,
        pixels: &[u8],
        out: &mut [u8],
    ) -> BlendResult<usize> {
        BlendError::ensure_len(FrameHeader::gray(width, height).len, pixels.len())?;
        let n = self
            .backend
            .encode_gray(width, height, quality, pixels, out)
            .map_err(|e| BlendError::encode(format!("{e:#}")))?;
        if n == 0 {
            return Err(BlendError::encode("backend wrote no gray jpeg bytes"));
        }
        Ok(n)
    }

    /// Forward a quality change to an encoder handle.
    pub fn set_quality(&self, handle: &mut B::Encoder, quality: u8) {
        self.backend.set_quality(handle, quality);
    }

    /// Forward a DCT method change to an encoder handle.
    pub fn set_dct_method(&self, handle: &mut B::Encoder, method: DctMethod) {
        self.backend.set_dct_method(handle, method);
    }

    /// Close every idle handle. Handles still rented are closed when returned.
    ///
    /// Idempotent; later rents fail with [`BlendError::CodecCreation`].
    pub fn shutdown(&self) {
        let (encoders, decoders) = {
            let mut st = self.state.lock();
            st.shut_down = true;
            let encoders = std::mem::take(&mut st.encoders.idle);
            let decoders = std::mem::take(&mut st.decoders.idle);
            st.encoders.stats.closed = st
                .encoders
                .stats
                .closed
                .saturating_add(encoders.len() as u64);
            st.decoders.stats.closed = st
                .decoders
                .stats
                .closed
                .saturating_add(decoders.len() as u64);
            (encoders, decoders)
        };
        if encoders.is_empty() && decoders.is_empty() {
            return;
        }
        tracing::debug!(
            encoders = encoders.len(),
            decoders = decoders.len(),
            "closing idle codec handles"
        );
        for h in encoders {
            self.backend.close_encoder(h);
        }
        for h in decoders {
            self.backend.close_decoder(h);
        }
    }
}

impl<B: JpegBackend> Drop for CodecPool<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: JpegBackend> std::fmt::Debug for CodecPool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecPool")
            .field("opts", &self.opts)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rented encoder that goes back to its [`CodecPool`] on drop.
pub struct EncoderLease<'p, B: JpegBackend> {
    pool: &'p CodecPool<B>,
    handle: Option<B::Encoder>,
}

impl<B: JpegBackend> Deref for EncoderLease<'_, B> {
    type Target = B::Encoder;

    fn deref(&self) -> &B::Encoder {
        self.handle.as_ref().expect("lease holds its handle until drop")
    }
}

impl<B: JpegBackend> DerefMut for EncoderLease<'_, B> {
    fn deref_mut(&mut self) -> &mut B::Encoder {
        self.handle.as_mut().expect("lease holds its handle until drop")
    }
}

impl<B: JpegBackend> Drop for EncoderLease<'_, B> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            self.pool.return_encoder(h);
        }
    }
}

/// Rented decoder that goes back to its [`CodecPool`] on drop.
pub struct DecoderLease<'p, B: JpegBackend> {
    pool: &'p CodecPool<B>,
    handle: Option<B::Decoder>,
}

impl<B: JpegBackend> Deref for DecoderLease<'_, B> {
    type Target = B::Decoder;

    fn deref(&self) -> &B::Decoder {
        self.handle.as_ref().expect("lease holds its handle until drop")
    }
}

impl<B: JpegBackend> DerefMut for DecoderLease<'_, B> {
    fn deref_mut(&mut self) -> &mut B::Decoder {
        self.handle.as_mut().expect("lease holds its handle until drop")
    }
}

impl<B: JpegBackend> Drop for DecoderLease<'_, B> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            self.pool.return_decoder(h);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/pool.rs"]
mod tests;
