//! Render pass: plugin list + registry → widget tree.
//!
//! Rendering is idempotent. Frames are created the first time their plugin is
//! seen and reused afterwards, so repeated passes never reset a frame or start
//! a second initial load.

use serde::Serialize;
use std::sync::Arc;

use crate::frame::{FrameId, FrameObserver, FrameSnapshot, FrameStatus, LoadError};
use crate::registry::FrameRegistry;
use crate::routes::RouteBuilder;

/// One embedded analytics view as drawn on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginFrameWidget {
    pub uid: FrameId,
    pub plugin_id: String,
    pub url: Option<String>,
    pub status: FrameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LoadError>,
    pub revision: u64,
}

impl PluginFrameWidget {
    pub fn bind(plugin_id: &str, snapshot: FrameSnapshot) -> Self {
        let (view_path, data) = match snapshot.content {
            Some(content) => (Some(content.view_path), Some(content.data)),
            None => (None, None),
        };
        Self {
            uid: snapshot.id,
            plugin_id: plugin_id.to_string(),
            url: snapshot.target_url,
            status: snapshot.status,
            view_path,
            data,
            error: snapshot.last_error,
            revision: snapshot.revision,
        }
    }

    /// HTML for this widget: the iframe once ready, otherwise a placeholder
    /// or an error box.
    pub fn to_html(&self) -> String {
        let uid = escape_html(self.uid.as_str());
        let plugin_id = escape_html(&self.plugin_id);
        let body = match (&self.status, &self.view_path) {
            (FrameStatus::Ready, Some(view_path)) => {
                let init = self
                    .data
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "null".to_string());
                format!(
                    r#"<iframe class="plugin-frame-view" src="{src}" data-uid="{uid}" data-plugin-id="{plugin_id}" data-init="{init}" sandbox="allow-scripts allow-same-origin allow-popups allow-forms"></iframe>"#,
                    src = escape_html(view_path),
                    init = escape_html(&init),
                )
            }
            (FrameStatus::Failed, _) => {
                let message = self
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Failed to load analytics".to_string());
                format!(
                    r#"<div class="plugin-frame-error" role="alert"><p>{}</p></div>"#,
                    escape_html(&message)
                )
            }
            _ => r#"<div class="plugin-frame-loading">Loading analytics...</div>"#.to_string(),
        };
        format!(
            r#"<div class="plugin-frame" data-uid="{uid}" data-plugin-id="{plugin_id}" data-status="{status}" data-revision="{revision}">{body}</div>"#,
            status = self.status,
            revision = self.revision,
        )
    }
}

pub struct RenderPass {
    registry: Arc<FrameRegistry>,
    routes: Arc<dyn RouteBuilder>,
    observer: Arc<dyn FrameObserver>,
}

impl RenderPass {
    pub fn new(
        registry: Arc<FrameRegistry>,
        routes: Arc<dyn RouteBuilder>,
        observer: Arc<dyn FrameObserver>,
    ) -> Self {
        Self { registry, routes, observer }
    }

    /// One widget per plugin, in input order. Frames for plugins seen for the
    /// first time are created with the plugin's dashboard URL and start loading.
    pub fn render(&self, plugin_ids: &[String]) -> Vec<PluginFrameWidget> {
        plugin_ids
            .iter()
            .enumerate()
            .map(|(index, plugin_id)| {
                let uid = FrameId::for_index(index);
                let (frame, created) = self.registry.get_or_create(
                    &uid,
                    || self.routes.dashboard_path(plugin_id),
                    &self.observer,
                );
                if created {
                    frame.load();
                }
                PluginFrameWidget::bind(plugin_id, frame.snapshot())
            })
            .collect()
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
