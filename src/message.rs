//! Inbound message protocol spoken by embedded analytics views.
//!
//! Wire shape (kept stable for third-party plugins):
//!
//! ```json
//! {"identifier": "f-0", "pluginId": "perf", "kind": "analytics.pipeline",
//!  "data": {"pipelineName": "build-1"}}
//! ```
//!
//! `uid` is accepted in place of `identifier`. Kinds this host does not know
//! parse to [`PluginRequest::Unrecognized`] and are ignored by the router.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::FrameId;

/// Ask the host to show a pipeline-scoped view in the sending frame.
pub const PIPELINE_ANALYTICS_KIND: &str = "analytics.pipeline";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(alias = "uid")]
    pub identifier: FrameId,
    pub plugin_id: String,
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MessageEnvelope {
    pub fn request(&self) -> Result<PluginRequest, MalformedPayload> {
        PluginRequest::parse(&self.kind, &self.data)
    }
}

/// Typed form of an envelope's `kind` + `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRequest {
    PipelineAnalytics { pipeline_name: String },
    Unrecognized { kind: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelinePayload {
    pipeline_name: String,
}

impl PluginRequest {
    pub fn parse(kind: &str, data: &serde_json::Value) -> Result<Self, MalformedPayload> {
        match kind {
            PIPELINE_ANALYTICS_KIND => {
                let payload = PipelinePayload::deserialize(data)
                    .map_err(|e| MalformedPayload::new(kind, e.to_string()))?;
                if payload.pipeline_name.trim().is_empty() {
                    return Err(MalformedPayload::new(kind, "pipelineName is empty"));
                }
                Ok(Self::PipelineAnalytics { pipeline_name: payload.pipeline_name })
            }
            other => Ok(Self::Unrecognized { kind: other.to_string() }),
        }
    }
}

/// A recognized kind whose `data` does not match its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPayload {
    pub kind: String,
    pub reason: String,
}

impl MalformedPayload {
    fn new(kind: &str, reason: impl Into<String>) -> Self {
        Self { kind: kind.to_string(), reason: reason.into() }
    }
}

impl fmt::Display for MalformedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed \"{}\" payload: {}", self.kind, self.reason)
    }
}

impl std::error::Error for MalformedPayload {}
