use clap::Parser;

fn main() -> anyhow::Result<()> {
    analytics_host::logging::init();
    analytics_host::run(analytics_host::Cli::parse())
}
