use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Retention limits for pooled byte buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained buffers per length bucket.
    pub max_buffers_per_bucket: usize,
}

impl Default for BufferPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            // A full window (10) plus the blend output and the encode target.
            max_buffers_per_bucket: 12,
        }
    }
}

/// Allocation and retention counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Buffers currently idle in the pool.
    pub retained_buffers: usize,
    /// Bytes currently idle in the pool.
    pub retained_bytes: usize,
    /// Buffers handed out and not yet released.
    pub outstanding: usize,
    /// Fresh allocations performed.
    pub alloc_buffers: u64,
    /// Bytes of fresh allocations performed.
    pub alloc_bytes: u64,
    /// Acquisitions served from an idle buffer.
    pub reused: u64,
    /// Releases that freed the buffer instead of retaining it.
    pub dropped_on_release: u64,
}

struct PoolState {
    stats: BufferPoolStats,
    // Op-level lookup, never per-pixel.
    buckets: HashMap<usize, Vec<Vec<u8>>>,
}

struct PoolShared {
    opts: BufferPoolOpts,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn release(&self, buf: Vec<u8>) {
        let bytes = buf.len();
        let mut st = self.state.lock();
        st.stats.outstanding = st.stats.outstanding.saturating_sub(1);

        if self.opts.max_pool_bytes == 0
            || self.opts.max_buffers_per_bucket == 0
            || st.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            st.stats.dropped_on_release = st.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = st.buckets.entry(bytes).or_default();
        if bucket.len() >= self.opts.max_buffers_per_bucket {
            st.stats.dropped_on_release = st.stats.dropped_on_release.saturating_add(1);
            return;
        }
        bucket.push(buf);
        st.stats.retained_buffers = st.stats.retained_buffers.saturating_add(1);
        st.stats.retained_bytes = st.stats.retained_bytes.saturating_add(bytes);
    }
}

/// Thread-safe pool of byte buffers keyed by exact length.
///
/// Cloning the pool yields another handle to the same storage. Buffers come back through
/// [`PooledBuffer`]'s `Drop`, so every acquisition is released exactly once.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new(opts: BufferPoolOpts) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                opts,
                state: Mutex::new(PoolState {
                    stats: BufferPoolStats::default(),
                    buckets: HashMap::new(),
                }),
            }),
        }
    }

    /// Retention limits this pool was created with.
    pub fn opts(&self) -> BufferPoolOpts {
        self.shared.opts
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        self.shared.state.lock().stats.clone()
    }

    /// Hand out a buffer of exactly `len` bytes.
    ///
    /// Reused buffers keep their previous contents; callers overwrite the bytes they read.
    pub fn acquire(&self, len: usize) -> PooledBuffer {
        let reused = {
            let mut st = self.shared.state.lock();
            st.stats.outstanding = st.stats.outstanding.saturating_add(1);
            let hit = st.buckets.get_mut(&len).and_then(Vec::pop);
            match hit {
                Some(buf) => {
                    st.stats.reused = st.stats.reused.saturating_add(1);
                    st.stats.retained_buffers = st.stats.retained_buffers.saturating_sub(1);
                    st.stats.retained_bytes = st.stats.retained_bytes.saturating_sub(len);
                    Some(buf)
                }
                None => {
                    st.stats.alloc_buffers = st.stats.alloc_buffers.saturating_add(1);
                    st.stats.alloc_bytes = st.stats.alloc_bytes.saturating_add(len as u64);
                    None
                }
            }
        };

        PooledBuffer {
            data: reused.unwrap_or_else(|| vec![0u8; len]),
            pool: Arc::clone(&self.shared),
        }
    }

    /// Drop every idle buffer.
    pub fn clear(&self) {
        let mut st = self.shared.state.lock();
        st.buckets.clear();
        st.stats.retained_buffers = 0;
        st.stats.retained_bytes = 0;
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("opts", &self.shared.opts)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Exclusively owned buffer that returns to its [`BufferPool`] when dropped.
///
/// Not `Clone`: a pooled allocation has exactly one owner at a time.
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Arc<PoolShared>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.data));
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PooledBuffer({} bytes)", self.data.len())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/pool.rs"]
mod tests;
