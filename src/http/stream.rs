use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::types::StreamEvent;
use crate::message::MessageEnvelope;
use crate::state::AppState;

pub(super) async fn ws_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

/// Push every redraw to the page and route the plugin messages it relays back.
async fn handle_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let clients = state.stream_clients.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(clients, "stream client connected");

    let mut trees = state.dashboard.subscribe();
    let send_task = tokio::spawn(async move {
        loop {
            // Latest tree only: redraws that land while a send is in flight
            // collapse into the next one.
            let tree = trees.borrow_and_update().clone();
            let text = match serde_json::to_string(&StreamEvent::render(&tree)) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode render event");
                    break;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
            if trees.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<MessageEnvelope>(text.as_str()) {
                Ok(envelope) => {
                    state.dashboard.dispatch(&envelope);
                }
                Err(e) => tracing::debug!(error = %e, "ignoring unparseable stream message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    state.stream_clients.fetch_sub(1, Ordering::Relaxed);
    tracing::debug!("stream client disconnected");
}
