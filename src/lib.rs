pub mod cli;
pub mod config;
pub mod dashboard;
pub mod frame;
pub mod http;
pub mod loader;
pub mod logging;
pub mod message;
pub mod registry;
pub mod render;
pub mod router;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_support;

use anyhow::Context;

pub use cli::Cli;
pub use config::HostConfig;
pub use dashboard::Dashboard;
pub use frame::{Frame, FrameContent, FrameId, FrameObserver, FrameSnapshot, FrameStatus, LoadError};
pub use loader::{ContentLoader, HttpContentLoader};
pub use message::{MessageEnvelope, PluginRequest};
pub use registry::FrameRegistry;
pub use render::{PluginFrameWidget, RenderPass};
pub use router::{DispatchOutcome, MessageRouter};
pub use routes::{AnalyticsRoutes, RouteBuilder};
pub use state::AppState;

/// Resolve the effective config (file, then env and flags) and serve the
/// dashboard until interrupted.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = config::load_host_config(&config_path);
    cli.apply(&mut config).map_err(anyhow::Error::msg)?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    if cli.save_config {
        config::save_host_config(&config_path, &config).map_err(anyhow::Error::msg)?;
        tracing::info!(path = %config_path.display(), "config saved");
        return Ok(());
    }
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if config.plugin_ids.is_empty() {
        tracing::warn!("no analytics plugins configured; the dashboard will be empty");
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    rt.block_on(async move {
        let state = AppState::new(config).map_err(anyhow::Error::msg)?;
        http::start_server(state).await
    })
}
