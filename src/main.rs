mod api;
mod app;
mod cli;
mod contacts;
mod dispatch;
mod error;
mod formatter;
mod gate;
mod matcher;
mod models;
mod scheduler;
mod sink;
mod storage;
mod utils;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("birthday_notifier=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let settings = app::Settings::load(cli.config.as_deref());
    let app = app::App::open(settings);
    cli::run(cli, app)
}
