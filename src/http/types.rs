use serde::Serialize;

use crate::render::PluginFrameWidget;

// --- Request/Response types ---

#[derive(Serialize)]
pub(super) struct HealthResponse {
    pub ok: bool,
    pub frames: usize,
    pub stream_clients: usize,
}

#[derive(Serialize)]
pub(super) struct ErrorResponse {
    pub error: String,
}

/// Server-pushed event on `/api/stream`.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum StreamEvent<'a> {
    /// Full widget tree after a redraw. `html` is parallel to `widgets`.
    Render {
        widgets: &'a [PluginFrameWidget],
        html: Vec<String>,
    },
}

impl<'a> StreamEvent<'a> {
    pub fn render(widgets: &'a [PluginFrameWidget]) -> Self {
        let html = widgets.iter().map(PluginFrameWidget::to_html).collect();
        Self::Render { widgets, html }
    }
}
