//! The dashboard page: server-rendered widgets plus a small bridge script
//! that relays `postMessage` traffic from the plugin iframes to
//! `/api/stream` and patches widgets in place on every redraw.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::render::escape_html;
use crate::state::AppState;

const BRIDGE_SCRIPT: &str = r#"(function () {
  "use strict";
  var proto = location.protocol === "https:" ? "wss:" : "ws:";
  var socket = null;
  var pending = [];
  var MAX_PENDING = 64;

  function fromOwnFrame(source) {
    var frames = document.querySelectorAll("iframe.plugin-frame-view");
    for (var i = 0; i < frames.length; i++) {
      if (frames[i].contentWindow === source) return true;
    }
    return false;
  }

  function initFrame(iframe) {
    iframe.addEventListener("load", function () {
      var data = null;
      try { data = JSON.parse(iframe.getAttribute("data-init")); } catch (e) {}
      iframe.contentWindow.postMessage({
        uid: iframe.getAttribute("data-uid"),
        pluginId: iframe.getAttribute("data-plugin-id"),
        kind: "init",
        data: data
      }, "*");
    });
  }

  function patch(widgets, html) {
    for (var i = 0; i < widgets.length; i++) {
      var el = document.querySelector('.plugin-frame[data-uid="' + widgets[i].uid + '"]');
      if (!el) continue;
      if (el.getAttribute("data-revision") === String(widgets[i].revision)) continue;
      el.outerHTML = html[i];
      var fresh = document.querySelector('.plugin-frame[data-uid="' + widgets[i].uid + '"] iframe');
      if (fresh) initFrame(fresh);
    }
  }

  function flush() {
    while (pending.length && socket && socket.readyState === WebSocket.OPEN) {
      socket.send(pending.shift());
    }
  }

  function connect() {
    socket = new WebSocket(proto + "//" + location.host + "/api/stream");
    socket.addEventListener("open", flush);
    socket.addEventListener("message", function (event) {
      var payload;
      try { payload = JSON.parse(event.data); } catch (e) { return; }
      if (payload.type === "render") patch(payload.widgets, payload.html);
    });
    socket.addEventListener("close", function () { setTimeout(connect, 2000); });
  }

  window.addEventListener("message", function (event) {
    var msg = event.data;
    if (!msg || typeof msg !== "object" || typeof msg.kind !== "string") return;
    if (!fromOwnFrame(event.source)) return;
    if (pending.length >= MAX_PENDING) {
      console.warn("analytics: dropping plugin message, stream offline", pending.shift());
    }
    pending.push(JSON.stringify(msg));
    flush();
  });

  document.querySelectorAll("iframe.plugin-frame-view").forEach(initFrame);
  connect();
})();
"#;

const STYLE: &str = r#"body{font-family:sans-serif;margin:0;padding:16px;background:#f4f6f8}
.plugin-frame{background:#fff;border:1px solid #dde;border-radius:4px;margin-bottom:16px;min-height:120px}
.plugin-frame-view{border:0;width:100%;height:480px}
.plugin-frame-loading,.plugin-frame-error{padding:24px;color:#667}
.plugin-frame-error{color:#a33}
.empty{color:#667}"#;

pub(super) async fn serve_dashboard(State(state): State<Arc<AppState>>) -> Response {
    let widgets = state.dashboard.widgets();
    let plugin_ids = serde_json::to_string(state.dashboard.plugin_ids())
        .unwrap_or_else(|_| "[]".to_string());

    let body = if widgets.is_empty() {
        r#"<p class="empty">No analytics plugins configured.</p>"#.to_string()
    } else {
        widgets.iter().map(|w| w.to_html()).collect::<Vec<_>>().join("\n")
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Analytics</title>
<style>{STYLE}</style>
</head>
<body>
<main class="analytics-dashboard" data-plugin-ids="{plugin_ids}">
{body}
</main>
<script>{BRIDGE_SCRIPT}</script>
</body>
</html>
"#,
        plugin_ids = escape_html(&plugin_ids),
    );

    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response()
}
