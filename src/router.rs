//! Routes inbound plugin messages to the frame they address.

use serde::Serialize;
use std::sync::Arc;

use crate::frame::FrameId;
use crate::message::{MessageEnvelope, PluginRequest};
use crate::registry::FrameRegistry;
use crate::routes::RouteBuilder;

/// What a dispatch did. At most one variant mutates state: `Redirected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Redirected { identifier: FrameId, url: String },
    /// No frame registered under the identifier yet.
    UnknownFrame { identifier: FrameId },
    Ignored { kind: String },
    Malformed { kind: String, reason: String },
}

pub struct MessageRouter {
    registry: Arc<FrameRegistry>,
    routes: Arc<dyn RouteBuilder>,
}

impl MessageRouter {
    pub fn new(registry: Arc<FrameRegistry>, routes: Arc<dyn RouteBuilder>) -> Self {
        Self { registry, routes }
    }

    /// Apply one message. Never fails: misses and unknown kinds are no-ops.
    pub fn dispatch(&self, envelope: &MessageEnvelope) -> DispatchOutcome {
        let Some(frame) = self.registry.get(&envelope.identifier) else {
            tracing::debug!(
                uid = %envelope.identifier,
                kind = %envelope.kind,
                "message for unregistered frame dropped"
            );
            return DispatchOutcome::UnknownFrame { identifier: envelope.identifier.clone() };
        };

        match envelope.request() {
            Ok(PluginRequest::PipelineAnalytics { pipeline_name }) => {
                let url = self.routes.pipeline_path(&envelope.plugin_id, &pipeline_name);
                tracing::info!(
                    uid = %envelope.identifier,
                    plugin_id = %envelope.plugin_id,
                    pipeline = %pipeline_name,
                    %url,
                    "switching frame to pipeline analytics"
                );
                frame.set_url_and_reload(url.clone());
                DispatchOutcome::Redirected { identifier: envelope.identifier.clone(), url }
            }
            Ok(PluginRequest::Unrecognized { kind }) => {
                tracing::debug!(uid = %envelope.identifier, %kind, "ignoring unrecognized message kind");
                DispatchOutcome::Ignored { kind }
            }
            Err(err) => {
                tracing::warn!(uid = %envelope.identifier, error = %err, "ignoring malformed message");
                DispatchOutcome::Malformed { kind: err.kind, reason: err.reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameObserver, FrameStatus};
    use crate::routes::AnalyticsRoutes;
    use crate::test_support::{RecordingObserver, ScriptedLoader};
    use serde_json::json;

    struct Fixture {
        router: MessageRouter,
        registry: Arc<FrameRegistry>,
        loader: Arc<ScriptedLoader>,
        observer: Arc<RecordingObserver>,
    }

    fn fixture(loader: Arc<ScriptedLoader>) -> Fixture {
        let registry = Arc::new(FrameRegistry::new(loader.clone()));
        let observer = RecordingObserver::new();
        let obs: Arc<dyn FrameObserver> = observer.clone();
        registry.get_or_create(&FrameId::new("f-0"), || "/go/analytics/X/dashboard".into(), &obs);
        Fixture {
            router: MessageRouter::new(registry.clone(), Arc::new(AnalyticsRoutes::default())),
            registry,
            loader,
            observer,
        }
    }

    fn envelope(identifier: &str, kind: &str, data: serde_json::Value) -> MessageEnvelope {
        MessageEnvelope {
            identifier: FrameId::new(identifier),
            plugin_id: "X".into(),
            kind: kind.into(),
            data,
        }
    }

    #[tokio::test]
    async fn pipeline_message_redirects_and_reloads_frame() {
        let fx = fixture(ScriptedLoader::ok());

        let outcome = fx.router.dispatch(&envelope(
            "f-0",
            "analytics.pipeline",
            json!({"pipelineName": "build-1"}),
        ));

        let expected = "/go/analytics/X/pipeline/build-1".to_string();
        assert_eq!(
            outcome,
            DispatchOutcome::Redirected { identifier: FrameId::new("f-0"), url: expected.clone() }
        );
        let ready = fx.observer.wait_for(|s| s.status == FrameStatus::Ready).await;
        assert_eq!(ready.target_url.as_deref(), Some(expected.as_str()));

        let statuses: Vec<_> = fx.observer.seen().iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![FrameStatus::Idle, FrameStatus::Loading, FrameStatus::Ready]);
        assert_eq!(fx.loader.requests(), vec![expected]);
    }

    #[tokio::test]
    async fn unknown_identifier_is_a_silent_noop() {
        let fx = fixture(ScriptedLoader::gated());
        let before = fx.registry.get(&FrameId::new("f-0")).unwrap().snapshot();

        let outcome = fx.router.dispatch(&envelope(
            "f-7",
            "analytics.pipeline",
            json!({"pipelineName": "build-1"}),
        ));

        assert_eq!(outcome, DispatchOutcome::UnknownFrame { identifier: FrameId::new("f-7") });
        assert_eq!(fx.registry.len(), 1);
        assert_eq!(fx.registry.get(&FrameId::new("f-0")).unwrap().snapshot(), before);
        assert!(fx.loader.requests().is_empty());
        assert!(fx.observer.seen().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_kind_leaves_frame_untouched() {
        let fx = fixture(ScriptedLoader::gated());
        let before = fx.registry.get(&FrameId::new("f-0")).unwrap().snapshot();

        let outcome = fx.router.dispatch(&envelope("f-0", "analytics.stage", json!({"x": 1})));

        assert_eq!(outcome, DispatchOutcome::Ignored { kind: "analytics.stage".into() });
        let after = fx.registry.get(&FrameId::new("f-0")).unwrap().snapshot();
        assert_eq!(after, before);
        assert!(fx.observer.seen().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_ignored() {
        let fx = fixture(ScriptedLoader::gated());

        let outcome = fx.router.dispatch(&envelope("f-0", "analytics.pipeline", json!({"name": 3})));

        assert!(matches!(outcome, DispatchOutcome::Malformed { ref kind, .. } if kind == "analytics.pipeline"));
        let frame = fx.registry.get(&FrameId::new("f-0")).unwrap();
        assert_eq!(frame.status(), FrameStatus::Idle);
        assert_eq!(frame.target_url().as_deref(), Some("/go/analytics/X/dashboard"));
    }

    #[tokio::test]
    async fn messages_apply_in_arrival_order() {
        let fx = fixture(ScriptedLoader::gated());

        fx.router.dispatch(&envelope("f-0", "analytics.pipeline", json!({"pipelineName": "a"})));
        fx.router.dispatch(&envelope("f-0", "analytics.pipeline", json!({"pipelineName": "b"})));

        assert_eq!(
            fx.loader.requests(),
            vec!["/go/analytics/X/pipeline/a".to_string(), "/go/analytics/X/pipeline/b".to_string()]
        );
        let frame = fx.registry.get(&FrameId::new("f-0")).unwrap();
        assert_eq!(frame.target_url().as_deref(), Some("/go/analytics/X/pipeline/b"));

        // Only the latest request may land.
        fx.loader.resolve("/go/analytics/X/pipeline/a", Err(crate::frame::LoadError::network("late")));
        fx.loader.resolve("/go/analytics/X/pipeline/b", Ok(crate::test_support::content_for("b")));
        let ready = fx.observer.wait_for(|s| s.status == FrameStatus::Ready).await;
        assert_eq!(ready.target_url.as_deref(), Some("/go/analytics/X/pipeline/b"));
        assert!(fx.observer.seen().iter().all(|s| s.status != FrameStatus::Failed));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(DispatchOutcome::Ignored { kind: "k".into() }).unwrap();
        assert_eq!(json, json!({"outcome": "ignored", "kind": "k"}));
    }
}
