//! Mounted dashboard: owns the registry, the single message router, and the
//! redraw loop that re-runs the render pass whenever a frame changes.

use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::frame::{FrameObserver, FrameSnapshot};
use crate::message::MessageEnvelope;
use crate::registry::FrameRegistry;
use crate::render::{PluginFrameWidget, RenderPass};
use crate::router::{DispatchOutcome, MessageRouter};
use crate::routes::RouteBuilder;

pub type WidgetTree = Arc<Vec<PluginFrameWidget>>;

/// Frame observer that requests a redraw. Bursts of requests collapse into
/// one pending redraw because the channel only keeps the latest counter.
pub struct RedrawScheduler {
    tx: watch::Sender<u64>,
}

impl RedrawScheduler {
    pub fn new() -> (Arc<Self>, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (Arc::new(Self { tx }), rx)
    }

    pub fn request(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }
}

impl FrameObserver for RedrawScheduler {
    fn frame_changed(&self, snapshot: &FrameSnapshot) {
        tracing::trace!(uid = %snapshot.id, status = %snapshot.status, revision = snapshot.revision, "redraw requested");
        self.request();
    }
}

pub struct Dashboard {
    plugin_ids: Vec<String>,
    registry: Arc<FrameRegistry>,
    router: MessageRouter,
    pass: RenderPass,
    tree: watch::Sender<WidgetTree>,
    /// Dropped with the dashboard, which stops the redraw loop.
    _stop: oneshot::Sender<()>,
}

impl Dashboard {
    /// Run the first render pass and start the redraw loop.
    ///
    /// Must be called from inside a tokio runtime. Call once per page: the
    /// dashboard owns the only router for its registry.
    pub fn mount(
        plugin_ids: Vec<String>,
        registry: Arc<FrameRegistry>,
        routes: Arc<dyn RouteBuilder>,
    ) -> Arc<Self> {
        let (scheduler, redraws) = RedrawScheduler::new();
        let pass = RenderPass::new(registry.clone(), routes.clone(), scheduler);
        let initial = pass.render(&plugin_ids);
        tracing::info!(frames = initial.len(), "dashboard mounted");

        let (tree, _) = watch::channel(Arc::new(initial));
        let (stop, stopped) = oneshot::channel();
        let dashboard = Arc::new(Self {
            plugin_ids,
            router: MessageRouter::new(registry.clone(), routes),
            registry,
            pass,
            tree,
            _stop: stop,
        });

        spawn_redraw_loop(Arc::downgrade(&dashboard), redraws, stopped);
        dashboard
    }

    fn redraw(&self) {
        let widgets = self.pass.render(&self.plugin_ids);
        self.tree.send_replace(Arc::new(widgets));
    }

    pub fn plugin_ids(&self) -> &[String] {
        &self.plugin_ids
    }

    pub fn registry(&self) -> &Arc<FrameRegistry> {
        &self.registry
    }

    /// Latest rendered widget tree.
    pub fn widgets(&self) -> WidgetTree {
        self.tree.borrow().clone()
    }

    /// Receiver that wakes after every redraw.
    pub fn subscribe(&self) -> watch::Receiver<WidgetTree> {
        self.tree.subscribe()
    }

    pub fn dispatch(&self, envelope: &MessageEnvelope) -> DispatchOutcome {
        self.router.dispatch(envelope)
    }
}

/// Re-render on every redraw request until the dashboard goes away.
///
/// Holds the dashboard weakly: frames keep the scheduler alive, so the
/// request channel alone never closes.
fn spawn_redraw_loop(
    dashboard: Weak<Dashboard>,
    mut redraws: watch::Receiver<u64>,
    mut stopped: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = redraws.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut stopped => break,
            }
            let Some(dashboard) = dashboard.upgrade() else { break };
            dashboard.redraw();
        }
        tracing::debug!("redraw loop stopped");
    })
}
