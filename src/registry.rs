//! Frame registry: one [`Frame`] per plugin identifier, created lazily and
//! kept for the life of the dashboard so identity and in-flight loads survive
//! re-renders.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;

use crate::frame::{Frame, FrameId, FrameObserver};
use crate::loader::ContentLoader;

pub struct FrameRegistry {
    frames: DashMap<FrameId, Arc<Frame>>,
    loader: Arc<dyn ContentLoader>,
    load_timeout: Option<Duration>,
}

impl FrameRegistry {
    pub fn new(loader: Arc<dyn ContentLoader>) -> Self {
        Self {
            frames: DashMap::new(),
            loader,
            load_timeout: None,
        }
    }

    /// Bound every load started by frames of this registry.
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Return the frame for `id`, creating it if absent.
    ///
    /// `default_url` and `observer` are only used on creation; an existing
    /// frame is returned untouched. New frames start `idle`. The returned flag
    /// is `true` when the frame was created by this call.
    ///
    /// `default_url` runs while the registry shard is locked and must not call
    /// back into the registry.
    pub fn get_or_create(
        &self,
        id: &FrameId,
        default_url: impl FnOnce() -> String,
        observer: &Arc<dyn FrameObserver>,
    ) -> (Arc<Frame>, bool) {
        match self.frames.entry(id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let frame = Arc::new(Frame::new(
                    id.clone(),
                    Some(default_url()),
                    Arc::clone(&self.loader),
                    Arc::clone(observer),
                    self.load_timeout,
                ));
                entry.insert(Arc::clone(&frame));
                tracing::debug!(uid = %id, url = ?frame.target_url(), "registered frame");
                (frame, true)
            }
        }
    }

    pub fn get(&self, id: &FrameId) -> Option<Arc<Frame>> {
        self.frames.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
