//! Command-line flags. Each flag can also come from an `ANALYTICS_HOST_*`
//! environment variable; both win over the config file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{parse_plugin_ids, HostConfig};

#[derive(Debug, Default, Parser)]
#[command(name = "analytics-host", version, about = "Serve the analytics dashboard for installed plugins")]
pub struct Cli {
    /// Config file (default: <config dir>/analytics-host/config.json)
    #[arg(long, env = "ANALYTICS_HOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind the dashboard server to
    #[arg(long, env = "ANALYTICS_HOST_BIND")]
    pub bind: Option<String>,

    #[arg(long, env = "ANALYTICS_HOST_PORT")]
    pub port: Option<u16>,

    /// Base URL of the analytics server
    #[arg(long = "analytics-url", env = "ANALYTICS_HOST_ANALYTICS_URL")]
    pub analytics_url: Option<String>,

    /// Path prefix of the analytics routes (e.g. /go)
    #[arg(long = "route-prefix", env = "ANALYTICS_HOST_ROUTE_PREFIX")]
    pub route_prefix: Option<String>,

    /// Plugin to show; repeat for several. Order is display order.
    #[arg(long = "plugin-id")]
    pub plugin_ids: Vec<String>,

    /// Plugin list as a JSON array, e.g. '["perf","flaky"]'
    #[arg(long = "plugin-ids-json", env = "ANALYTICS_HOST_PLUGIN_IDS")]
    pub plugin_ids_json: Option<String>,

    /// Per-load deadline in seconds; 0 disables it
    #[arg(long = "load-timeout-secs", env = "ANALYTICS_HOST_LOAD_TIMEOUT_SECS")]
    pub load_timeout_secs: Option<u64>,

    /// Print the effective config as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Write the effective config back to the config file and exit
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Overlay flags (and their env fallbacks) onto a loaded config.
    pub fn apply(&self, config: &mut HostConfig) -> Result<(), String> {
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = &self.analytics_url {
            config.analytics_base_url = url.clone();
        }
        if let Some(prefix) = &self.route_prefix {
            config.route_prefix = prefix.clone();
        }
        if !self.plugin_ids.is_empty() {
            config.plugin_ids = self.plugin_ids.clone();
        } else if let Some(json) = &self.plugin_ids_json {
            config.plugin_ids = parse_plugin_ids(json)?;
        }
        if let Some(secs) = self.load_timeout_secs {
            config.load_timeout_secs = secs;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "ANALYTICS_HOST_CONFIG",
        "ANALYTICS_HOST_BIND",
        "ANALYTICS_HOST_PORT",
        "ANALYTICS_HOST_ANALYTICS_URL",
        "ANALYTICS_HOST_ROUTE_PREFIX",
        "ANALYTICS_HOST_PLUGIN_IDS",
        "ANALYTICS_HOST_LOAD_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            // SAFETY: tests touching the environment run under #[serial].
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn no_flags_keep_file_values() {
        clear_env();
        let cli = Cli::try_parse_from(["analytics-host"]).unwrap();
        let mut config = HostConfig { port: 9999, ..HostConfig::default() };

        cli.apply(&mut config).unwrap();

        assert_eq!(config.port, 9999);
        assert_eq!(config.route_prefix, "/go");
    }

    #[test]
    #[serial]
    fn flags_override_config() {
        clear_env();
        let cli = Cli::try_parse_from([
            "analytics-host",
            "--port",
            "9100",
            "--analytics-url",
            "https://ci.example.com",
            "--plugin-id",
            "perf",
            "--plugin-id",
            "flaky",
            "--load-timeout-secs",
            "0",
        ])
        .unwrap();
        let mut config = HostConfig::default();

        cli.apply(&mut config).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.analytics_base_url, "https://ci.example.com");
        assert_eq!(config.plugin_ids, vec!["perf".to_string(), "flaky".to_string()]);
        assert_eq!(config.load_timeout(), None);
    }

    #[test]
    #[serial]
    fn env_vars_fill_in_for_flags() {
        clear_env();
        unsafe {
            std::env::set_var("ANALYTICS_HOST_PORT", "9200");
            std::env::set_var("ANALYTICS_HOST_PLUGIN_IDS", r#"["perf","flaky"]"#);
        }
        let cli = Cli::try_parse_from(["analytics-host"]).unwrap();
        let mut config = HostConfig::default();
        let applied = cli.apply(&mut config);
        clear_env();

        applied.unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.plugin_ids, vec!["perf".to_string(), "flaky".to_string()]);
    }

    #[test]
    #[serial]
    fn flag_beats_env_var() {
        clear_env();
        unsafe { std::env::set_var("ANALYTICS_HOST_PORT", "9200") };
        let cli = Cli::try_parse_from(["analytics-host", "--port", "9300"]).unwrap();
        clear_env();

        assert_eq!(cli.port, Some(9300));
    }

    #[test]
    #[serial]
    fn malformed_plugin_list_is_rejected() {
        clear_env();
        let cli = Cli::try_parse_from(["analytics-host", "--plugin-ids-json", "perf,flaky"]).unwrap();
        let mut config = HostConfig::default();

        let err = cli.apply(&mut config).unwrap_err();
        assert!(err.contains("JSON array"));
        assert!(config.plugin_ids.is_empty());
    }
}
