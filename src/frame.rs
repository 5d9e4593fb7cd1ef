//! Per-plugin frame state.
//!
//! A [`Frame`] tracks one embedded analytics view: the URL it should show, its
//! load status, and the loaded view descriptor or the error that replaced it.
//! Every transition is published to a [`FrameObserver`] as an immutable
//! [`FrameSnapshot`] taken under the frame's lock, so observers never see a
//! URL paired with a status that belongs to a different load.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::loader::ContentLoader;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable key addressing one embedded view on the dashboard.
///
/// Uniqueness is the caller's responsibility: two unrelated plugins handed the
/// same id will share a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the frame rendered at `index` in the plugin list (`f-0`, `f-1`, ...).
    pub fn for_index(index: usize) -> Self {
        Self(format!("f-{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Status, content, errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// View descriptor returned by an analytics endpoint: the path the iframe
/// should display and the data handed to the embedded view once it loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameContent {
    pub view_path: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadErrorKind {
    /// The analytics endpoint answered with a non-success status.
    Http { status: u16 },
    Network,
    Decode,
    Timeout,
    MissingUrl,
    /// No async runtime was available to run the fetch.
    Runtime,
}

/// Why a frame failed to load. Recorded on the frame, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    #[serde(flatten)]
    pub kind: LoadErrorKind,
    pub message: String,
}

impl LoadError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self { kind: LoadErrorKind::Http { status }, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self { kind: LoadErrorKind::Network, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self { kind: LoadErrorKind::Decode, message: message.into() }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self {
            kind: LoadErrorKind::Timeout,
            message: format!("analytics view did not load within {}s", limit.as_secs_f64()),
        }
    }

    pub fn missing_url() -> Self {
        Self { kind: LoadErrorKind::MissingUrl, message: "frame has no target url".to_string() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self { kind: LoadErrorKind::Runtime, message: message.into() }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoadErrorKind::Http { status } => write!(f, "HTTP {status}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for LoadError {}

// ---------------------------------------------------------------------------
// Snapshots and observers
// ---------------------------------------------------------------------------

/// Consistent, immutable view of a frame at one revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub id: FrameId,
    pub target_url: Option<String>,
    pub status: FrameStatus,
    pub content: Option<FrameContent>,
    pub last_error: Option<LoadError>,
    /// Bumped on every transition; lets observers drop out-of-order deliveries.
    pub revision: u64,
}

/// Receives every frame transition after it has landed.
///
/// Called outside the frame's lock, so implementations may read the frame
/// (or the registry) freely. On a multi-threaded runtime deliveries for one
/// frame can arrive out of order (a completing load racing a redirect).
/// Consumers that keep snapshots must order them by `revision` and drop any
/// older than the last one seen.
pub trait FrameObserver: Send + Sync {
    fn frame_changed(&self, snapshot: &FrameSnapshot);
}

impl<F> FrameObserver for F
where
    F: Fn(&FrameSnapshot) + Send + Sync,
{
    fn frame_changed(&self, snapshot: &FrameSnapshot) {
        self(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

enum LoadState {
    Idle,
    Loading,
    Ready(FrameContent),
    Failed(LoadError),
}

struct FrameInner {
    target_url: Option<String>,
    state: LoadState,
    /// Ticket of the load whose completion may still land.
    generation: u64,
    revision: u64,
}

impl FrameInner {
    fn transition(&mut self, state: LoadState) {
        self.state = state;
        self.revision += 1;
    }

    fn snapshot(&self, id: &FrameId) -> FrameSnapshot {
        let (status, content, last_error) = match &self.state {
            LoadState::Idle => (FrameStatus::Idle, None, None),
            LoadState::Loading => (FrameStatus::Loading, None, None),
            LoadState::Ready(content) => (FrameStatus::Ready, Some(content.clone()), None),
            LoadState::Failed(err) => (FrameStatus::Failed, None, Some(err.clone())),
        };
        FrameSnapshot {
            id: id.clone(),
            target_url: self.target_url.clone(),
            status,
            content,
            last_error,
            revision: self.revision,
        }
    }
}

pub struct Frame {
    id: FrameId,
    inner: Mutex<FrameInner>,
    loader: Arc<dyn ContentLoader>,
    observer: Arc<dyn FrameObserver>,
    load_timeout: Option<Duration>,
}

impl Frame {
    pub(crate) fn new(
        id: FrameId,
        target_url: Option<String>,
        loader: Arc<dyn ContentLoader>,
        observer: Arc<dyn FrameObserver>,
        load_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            inner: Mutex::new(FrameInner {
                target_url,
                state: LoadState::Idle,
                generation: 0,
                revision: 0,
            }),
            loader,
            observer,
            load_timeout,
        }
    }

    pub fn status(&self) -> FrameStatus {
        self.snapshot().status
    }

    pub fn target_url(&self) -> Option<String> {
        self.inner.lock().target_url.clone()
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        self.inner.lock().snapshot(&self.id)
    }

    /// Fetch the current target URL.
    ///
    /// No-op while a load is already in flight. The fetch runs on the current
    /// tokio runtime; its completion moves the frame to `ready` or `failed`.
    pub fn load(self: &Arc<Self>) {
        let (snapshot, request) = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, LoadState::Loading) {
                tracing::debug!(uid = %self.id, "load already in flight, skipping");
                return;
            }
            let request = match inner.target_url.clone() {
                Some(url) => {
                    inner.generation += 1;
                    inner.transition(LoadState::Loading);
                    Some((url, inner.generation))
                }
                None => {
                    inner.transition(LoadState::Failed(LoadError::missing_url()));
                    None
                }
            };
            (inner.snapshot(&self.id), request)
        };
        self.observer.frame_changed(&snapshot);

        let Some((url, generation)) = request else {
            tracing::warn!(uid = %self.id, "cannot load frame without a target url");
            return;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                self.finish(generation, Err(LoadError::runtime(format!("no async runtime: {e}"))));
                return;
            }
        };

        tracing::debug!(uid = %self.id, %url, "loading analytics view");
        let fetch = self.loader.fetch(&url);
        let limit = self.load_timeout;
        let frame = Arc::clone(self);
        runtime.spawn(async move {
            let result = match limit {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or_else(|_| Err(LoadError::timeout(limit))),
                None => fetch.await,
            };
            frame.finish(generation, result);
        });
    }

    /// Point the frame at `url` and reload it.
    ///
    /// The only way to change the target URL. A load still in flight for the
    /// previous URL is superseded: its completion is discarded.
    pub fn set_url_and_reload(self: &Arc<Self>, url: impl Into<String>) {
        let snapshot = {
            let mut inner = self.inner.lock();
            inner.target_url = Some(url.into());
            inner.generation += 1;
            inner.transition(LoadState::Idle);
            inner.snapshot(&self.id)
        };
        self.observer.frame_changed(&snapshot);
        self.load();
    }

    fn finish(&self, generation: u64, result: Result<FrameContent, LoadError>) {
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || !matches!(inner.state, LoadState::Loading) {
                tracing::debug!(uid = %self.id, generation, "discarding superseded load result");
                return;
            }
            match result {
                Ok(content) => inner.transition(LoadState::Ready(content)),
                Err(err) => inner.transition(LoadState::Failed(err)),
            }
            inner.snapshot(&self.id)
        };

        match &snapshot.last_error {
            Some(err) => tracing::warn!(
                uid = %self.id,
                url = snapshot.target_url.as_deref().unwrap_or_default(),
                error = %err,
                "analytics view failed to load"
            ),
            None => tracing::debug!(uid = %self.id, "analytics view ready"),
        }
        self.observer.frame_changed(&snapshot);
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("target_url", &inner.target_url)
            .field("revision", &inner.revision)
            .finish_non_exhaustive()
    }
}
