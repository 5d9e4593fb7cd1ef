//! Analytics server paths.

/// Builds the paths a frame can be pointed at.
pub trait RouteBuilder: Send + Sync {
    /// Generic dashboard view of a plugin.
    fn dashboard_path(&self, plugin_id: &str) -> String;
    /// View scoped to a single pipeline.
    fn pipeline_path(&self, plugin_id: &str, pipeline_name: &str) -> String;
}

/// `{prefix}/analytics/{plugin_id}/dashboard` and
/// `{prefix}/analytics/{plugin_id}/pipeline/{pipeline_name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRoutes {
    prefix: String,
}

impl AnalyticsRoutes {
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_end_matches('/');
        let prefix = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        Self { prefix }
    }

    fn build(&self, segments: &[&str]) -> String {
        let mut path = self.prefix.clone();
        for segment in segments {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
        path
    }
}

impl Default for AnalyticsRoutes {
    fn default() -> Self {
        Self::new("/go")
    }
}

impl RouteBuilder for AnalyticsRoutes {
    fn dashboard_path(&self, plugin_id: &str) -> String {
        self.build(&["analytics", plugin_id, "dashboard"])
    }

    fn pipeline_path(&self, plugin_id: &str, pipeline_name: &str) -> String {
        self.build(&["analytics", plugin_id, "pipeline", pipeline_name])
    }
}

/// Percent-encode one path segment. `/` is encoded, spaces become `%20`.
fn encode_segment(segment: &str) -> String {
    // byte_serialize writes spaces as `+` and escapes literal `+` as `%2B`,
    // so the swap below cannot collide.
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_paths() {
        let routes = AnalyticsRoutes::default();
        assert_eq!(routes.dashboard_path("perf"), "/go/analytics/perf/dashboard");
        assert_eq!(
            routes.pipeline_path("perf", "build-1"),
            "/go/analytics/perf/pipeline/build-1"
        );
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(AnalyticsRoutes::new("go/").dashboard_path("p"), "/go/analytics/p/dashboard");
        assert_eq!(AnalyticsRoutes::new("").dashboard_path("p"), "/analytics/p/dashboard");
        assert_eq!(AnalyticsRoutes::new("/").dashboard_path("p"), "/analytics/p/dashboard");
    }

    #[test]
    fn segments_are_percent_encoded() {
        let routes = AnalyticsRoutes::default();
        assert_eq!(
            routes.pipeline_path("com.example.analytics", "my pipeline/v2+x"),
            "/go/analytics/com.example.analytics/pipeline/my%20pipeline%2Fv2%2Bx"
        );
    }
}
