use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use rayon::prelude::*;
use tokio::sync::oneshot;

use crate::blend::mode::BlendMode;
use crate::blend::ops;
use crate::buffer::pool::BufferPool;
use crate::codec::backend::JpegBackend;
use crate::codec::pool::CodecPool;
use crate::engine::config::EngineConfig;
use crate::foundation::error::{BlendError, BlendResult};
use crate::foundation::frame::{FrameHeader, FrameImage, PixelFormat};
use crate::source::frame_source::FrameSource;


/// Counters over [`HdrEngine::get`] and [`HdrEngine::get_async`] calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Calls started.
    pub frames_requested: u64,
    /// Calls that returned an encoded frame.
    pub frames_produced: u64,
    /// Calls that returned an error.
    pub frames_failed: u64,
    /// Total compressed bytes returned.
    pub bytes_encoded: u64,
}

#[derive(Default)]
struct Counters {
    requested: AtomicU64,
    produced: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
}

struct EngineShared<B: JpegBackend, S> {
    codec: CodecPool<B>,
    buffers: BufferPool,
    source: S,
    workers: rayon::ThreadPool,
    counters: Counters,
}

/// Sliding-window exposure blender.
///
/// For a target frame id the engine fetches and decodes `window_count` frames in parallel
/// (slot `i` is frame `frame_id - i`, clamped at zero), checks that they agree on size, fuses
/// them with the configured [`BlendMode`] and re-encodes the result to JPEG.
///
/// Concurrent `get` calls share the codec and buffer pools; every buffer a call obtains is
/// released when the call returns, on success and on error alike.
pub struct HdrEngine<B: JpegBackend, S: FrameSource> {
    cfg: EngineConfig,
    shared: Arc<EngineShared<B, S>>,
}

fn build_thread_pool(threads: Option<usize>) -> BlendResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("hdrblend-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BlendError::configuration(format!("failed to build rayon thread pool: {e}")))
}

fn warn_if_unnormalized(mode: &BlendMode) {
    if let BlendMode::Weighted(m) = mode
        && let Err(e) = m.check_normalized()
    {
        tracing::warn!(error = %e, "weight matrix is not normalized; output may saturate");
    }
}

impl<B: JpegBackend, S: FrameSource> HdrEngine<B, S> {
    /// Build an engine that owns a codec pool over `backend` and pulls frames from `source`.
    pub fn new(backend: B, source: S, cfg: EngineConfig) -> BlendResult<Self> {
        cfg.validate()?;
        warn_if_unnormalized(&cfg.mode);
        let workers = build_thread_pool(cfg.threads)?;
        let shared = EngineShared {
            codec: CodecPool::new(backend, cfg.codec_pool_opts()),
            buffers: BufferPool::new(cfg.buffer_pool),
            source,
            workers,
            counters: Counters::default(),
        };
        Ok(Self {
            cfg,
            shared: Arc::new(shared),
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Change the window size. Checked on the next `get`.
    pub fn set_window_count(&mut self, window_count: usize) {
        self.cfg.window_count = window_count;
    }

    /// Change the blend mode. Checked on the next `get`.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        warn_if_unnormalized(&mode);
        self.cfg.mode = mode;
    }

    /// Change the output quality. Checked on the next `get`.
    pub fn set_quality(&mut self, quality: u8) {
        self.cfg.quality = quality;
    }

    /// Change the layout frames are decoded to. Checked on the next `get`.
    pub fn set_decode_format(&mut self, format: PixelFormat) {
        self.cfg.decode_format = format;
    }

    /// Codec handle pool owned by the engine.
    pub fn codec_pool(&self) -> &CodecPool<B> {
        &self.shared.codec
    }

    /// Byte buffer pool owned by the engine.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.shared.buffers
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> EngineStats {
        let c = &self.shared.counters;
        EngineStats {
            frames_requested: c.requested.load(Ordering::Relaxed),
            frames_produced: c.produced.load(Ordering::Relaxed),
            frames_failed: c.failed.load(Ordering::Relaxed),
            bytes_encoded: c.bytes.load(Ordering::Relaxed),
        }
    }

    /// Blend the window ending at `frame_id` and return it JPEG-encoded.
    ///
    /// The returned image's header carries the blended geometry; `len` is the compressed size.
    #[tracing::instrument(
        skip(self),
        fields(window = self.cfg.window_count, mode = self.cfg.mode.name())
    )]
    pub fn get(&self, frame_id: u64) -> BlendResult<FrameImage<'static>> {
        let shared = &self.shared;
        shared.workers.install(|| shared.get(&self.cfg, frame_id))
    }

    /// Blend the window ending at `frame_id` without encoding it.
    ///
    /// Not counted in [`HdrEngine::stats`].
    pub fn get_raw(&self, frame_id: u64) -> BlendResult<FrameImage<'static>> {
        let shared = &self.shared;
        shared.workers.install(|| {
            self.cfg.validate()?;
            shared.blend_window(&self.cfg, frame_id)
        })
    }

    /// Close idle codec handles; the engine cannot produce frames afterwards.
    pub fn shutdown(&self) {
        self.shared.codec.shutdown();
    }
}

impl<B: JpegBackend, S: FrameSource + 'static> HdrEngine<B, S> {
    /// [`HdrEngine::get`] on the engine's worker pool, delivered through a future.
    ///
    /// The configuration is captured when this is called. Dropping the future abandons the
    /// result; the work still runs to completion and releases its buffers.
    pub fn get_async(
        &self,
        frame_id: u64,
    ) -> impl Future<Output = BlendResult<FrameImage<'static>>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let cfg = self.cfg.clone();
        self.shared.workers.spawn(move || {
            let span = tracing::debug_span!("get_async", frame_id, window = cfg.window_count);
            let _enter = span.enter();
            // Receiver gone means the caller stopped waiting.
            let _ = tx.send(shared.get(&cfg, frame_id));
        });

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(BlendError::Other(anyhow!("engine worker dropped the request"))),
            }
        }
    }
}

impl<B: JpegBackend, S: FrameSource> Drop for HdrEngine<B, S> {
    fn drop(&mut self) {
        self.shared.codec.shutdown();
    }
}

impl<B: JpegBackend, S: FrameSource> EngineShared<B, S> {
    fn get(&self, cfg: &EngineConfig, frame_id: u64) -> BlendResult<FrameImage<'static>> {
        self.counters.requested.fetch_add(1, Ordering::Relaxed);
        let result = cfg
            .validate()
            .and_then(|()| self.blend_window(cfg, frame_id))
            .and_then(|raw| self.encode(cfg, &raw));

        match &result {
            Ok(img) => {
                self.counters.produced.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .bytes
                    .fetch_add(img.header().len as u64, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(frame_id, error = %e, "blend request failed");
            }
        }
        result
    }

    fn decode_slot(&self, cfg: &EngineConfig, frame_id: u64) -> BlendResult<FrameImage<'static>> {
        let jpeg = self
            .source
            .fetch(frame_id)
            .map_err(|source| BlendError::Fetch { frame_id, source })?;
        let info = self.codec.get_image_info(&jpeg)?;
        let limits = self.codec.opts();
        if info.width > limits.max_width || info.height > limits.max_height {
            return Err(BlendError::decode(format!(
                "frame {frame_id} is {}x{}, decoders accept at most {}x{}",
                info.width, info.height, limits.max_width, limits.max_height
            )));
        }

        let format = cfg.effective_decode_format();
        let mut buf = self
            .buffers
            .acquire(FrameHeader::packed(info.width, info.height, format).len);
        let mut decoder = self.codec.lease_decoder()?;
        let header = match format {
            PixelFormat::Gray8 => self.codec.decode_gray(&mut decoder, &jpeg, &mut buf)?,
            PixelFormat::I420 => self.codec.decode_subsampled(&mut decoder, &jpeg, &mut buf)?,
            other => return Err(BlendError::UnsupportedFormat(other)),
        };
        FrameImage::pooled(header, buf)
    }

    fn blend_window(&self, cfg: &EngineConfig, frame_id: u64) -> BlendResult<FrameImage<'static>> {
        let decoded = (0..cfg.window_count)
            .into_par_iter()
            .map(|slot| self.decode_slot(cfg, frame_id.saturating_sub(slot as u64)))
            .collect::<Vec<_>>();

        let mut frames = Vec::with_capacity(decoded.len());
        for item in decoded {
            frames.push(item?);
        }

        let expected = frames
            .first()
            .map(|f| f.header().dimensions())
            .ok_or_else(|| BlendError::configuration("empty window"))?;
        for (index, frame) in frames.iter().enumerate().skip(1) {
            let actual = frame.header().dimensions();
            if actual != expected {
                return Err(BlendError::DimensionMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }

        let out_header = ops::output_header(&cfg.mode, &frames)?;
        let mut out = self.buffers.acquire(out_header.len);
        let header = ops::blend_into(&cfg.mode, &frames, &mut out)?;
        drop(frames);
        FrameImage::pooled(header, out)
    }

    fn encode(&self, cfg: &EngineConfig, raw: &FrameImage<'_>) -> BlendResult<FrameImage<'static>> {
        let h = *raw.header();
        if !matches!(h.format, PixelFormat::Gray8 | PixelFormat::I420) {
            return Err(BlendError::UnsupportedFormat(h.format));
        }

        let components = if h.format == PixelFormat::Gray8 { 1 } else { 3 };
        let bound = self
            .codec
            .backend()
            .max_encoded_len(h.width, h.height, components);
        let capacity = self.codec.opts().encode_buffer_size.max(bound);
        let mut out = self.buffers.acquire(capacity);
        let written = if h.format == PixelFormat::Gray8 {
            self.codec
                .encode_gray(h.width, h.height, cfg.quality, raw.data(), &mut out)?
        } else {
            let mut encoder = self.codec.lease_encoder()?;
            self.codec.set_quality(&mut encoder, cfg.quality);
            self.codec.set_dct_method(&mut encoder, cfg.dct_method);
            self.codec
                .encode_subsampled(&mut encoder, h.width, h.height, raw.data(), &mut out)?
        };
        FrameImage::pooled(h.with_len(written), out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/hdr_engine.rs"]
mod tests;
