use std::collections::HashMap;

use anyhow::anyhow;
use parking_lot::RwLock;

/// Supplier of compressed (JPEG) frame bytes by frame id.
///
/// Called concurrently from the engine's worker pool, once per window slot. Ids below the first
/// available frame are never requested: the engine clamps slot ids at zero.
pub trait FrameSource: Send + Sync {
    /// Return the compressed bytes of `frame_id`.
    fn fetch(&self, frame_id: u64) -> anyhow::Result<Vec<u8>>;
}

impl<F> FrameSource for F
where
    F: Fn(u64) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn fetch(&self, frame_id: u64) -> anyhow::Result<Vec<u8>> {
        self(frame_id)
    }
}

/// In-memory source for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryFrameSource {
    frames: RwLock<HashMap<u64, Vec<u8>>>,
}

impl InMemoryFrameSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the bytes of `frame_id`.
    pub fn insert(&self, frame_id: u64, jpeg: Vec<u8>) {
        self.frames.write().insert(frame_id, jpeg);
    }

    /// Forget `frame_id`, returning its bytes if present.
    pub fn remove(&self, frame_id: u64) -> Option<Vec<u8>> {
        self.frames.write().remove(&frame_id)
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    /// True when no frame is stored.
    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }
}

impl FromIterator<(u64, Vec<u8>)> for InMemoryFrameSource {
    fn from_iter<I: IntoIterator<Item = (u64, Vec<u8>)>>(iter: I) -> Self {
        Self {
            frames: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl FrameSource for InMemoryFrameSource {
    fn fetch(&self, frame_id: u64) -> anyhow::Result<Vec<u8>> {
        self.frames
            .read()
            .get(&frame_id)
            .cloned()
            .ok_or_else(|| anyhow!("frame {frame_id} not found"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/frame_source.rs"]
mod tests;
