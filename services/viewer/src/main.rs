use clap::{Arg, ArgAction, Command};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use viewer::render::TextRenderer;
use viewer::{Viewer, ViewerConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("sirenwatch viewer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live terminal dashboard of ambulances passing traffic lights")
        .arg(
            Arg::new("url")
                .help("Broadcaster push endpoint")
                .long("url")
                .default_value("ws://127.0.0.1:3001/ws"),
        )
        .arg(
            Arg::new("reconnect_delay_secs")
                .help("Seconds to wait before reconnecting")
                .long("reconnect-delay-secs")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("5"),
        )
        .arg(
            Arg::new("feed_only")
                .help("Draw only the scrolling feed")
                .long("feed-only")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let url = matches
        .get_one::<String>("url")
        .cloned()
        .unwrap_or_default();
    let delay_secs = matches
        .get_one::<u64>("reconnect_delay_secs")
        .copied()
        .unwrap_or(5);
    let feed_only = matches.get_flag("feed_only");

    let config = ViewerConfig {
        url,
        reconnect_delay: Duration::from_secs(delay_secs),
    };
    info!(url = %config.url, version = env!("CARGO_PKG_VERSION"), "viewer starting");

    let renderer = TextRenderer::new(std::io::stdout()).feed_only(feed_only);
    let mut viewer = Viewer::new(config, renderer);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    viewer.run(shutdown_rx).await;
}
