//! Shared fakes for unit tests: a scripted content loader and an observer
//! that records every snapshot it is handed.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

use crate::frame::{FrameContent, FrameObserver, FrameSnapshot, LoadError};
use crate::loader::ContentLoader;

type LoadResult = Result<FrameContent, LoadError>;

/// Content the scripted loader produces for `url`.
pub(crate) fn content_for(url: &str) -> FrameContent {
    FrameContent {
        view_path: format!("{url}/view"),
        data: serde_json::json!({ "source": url }),
    }
}

enum Script {
    Succeed,
    Fail(LoadError),
    /// Hold every request until the test resolves it.
    Gated,
}

pub(crate) struct ScriptedLoader {
    script: Script,
    requests: Mutex<Vec<String>>,
    gates: Mutex<Vec<(String, oneshot::Sender<LoadResult>)>>,
}

impl ScriptedLoader {
    fn with(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
            gates: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok() -> Arc<Self> {
        Self::with(Script::Succeed)
    }

    pub(crate) fn failing(err: LoadError) -> Arc<Self> {
        Self::with(Script::Fail(err))
    }

    pub(crate) fn gated() -> Arc<Self> {
        Self::with(Script::Gated)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Complete the oldest pending request for `url`.
    pub(crate) fn resolve(&self, url: &str, result: LoadResult) {
        let sender = {
            let mut gates = self.gates.lock();
            let pos = gates
                .iter()
                .position(|(pending, _)| pending == url)
                .unwrap_or_else(|| panic!("no pending request for {url}"));
            gates.remove(pos).1
        };
        let _ = sender.send(result);
    }
}

impl ContentLoader for ScriptedLoader {
    fn fetch(&self, url: &str) -> BoxFuture<'static, LoadResult> {
        self.requests.lock().push(url.to_string());
        match &self.script {
            Script::Succeed => {
                let content = content_for(url);
                Box::pin(async move { Ok(content) })
            }
            Script::Fail(err) => {
                let err = err.clone();
                Box::pin(async move { Err(err) })
            }
            Script::Gated => {
                let (tx, rx) = oneshot::channel();
                self.gates.lock().push((url.to_string(), tx));
                Box::pin(async move {
                    rx.await
                        .unwrap_or_else(|_| Err(LoadError::network("scripted loader dropped request")))
                })
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    seen: Mutex<Vec<FrameSnapshot>>,
    notify: Notify,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn seen(&self) -> Vec<FrameSnapshot> {
        self.seen.lock().clone()
    }

    /// Wait until a recorded snapshot matches `pred`, returning the latest match.
    pub(crate) async fn wait_for(&self, pred: impl Fn(&FrameSnapshot) -> bool) -> FrameSnapshot {
        let wait = async {
            loop {
                let found = self.seen.lock().iter().rev().find(|s| pred(*s)).cloned();
                if let Some(snapshot) = found {
                    return snapshot;
                }
                self.notify.notified().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for frame transition")
    }
}

impl FrameObserver for RecordingObserver {
    fn frame_changed(&self, snapshot: &FrameSnapshot) {
        self.seen.lock().push(snapshot.clone());
        self.notify.notify_one();
    }
}
