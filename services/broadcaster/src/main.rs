use broadcaster::config::BroadcasterConfig;
use broadcaster::dispatcher::Dispatcher;
use broadcaster::poller::WatermarkPoller;
use broadcaster::registry::ConnectionRegistry;
use broadcaster::source::{EventSource, PgEventSource};
use broadcaster::{db, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match BroadcasterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!(panic = %panic, "unhandled panic");
    }));

    let pg = PgEventSource::new(config.query_timeout);
    db::spawn_connector(&config, pg.pool_slot());
    let source: Arc<dyn EventSource> = Arc::new(pg);

    let registry = ConnectionRegistry::new();
    let poller = WatermarkPoller::new(Arc::clone(&source), config.bootstrap_window);
    let dispatcher = Arc::new(Dispatcher::new(
        poller,
        registry.clone(),
        config.poll_interval,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = tokio::spawn(Arc::clone(&dispatcher).run(shutdown_rx));

    let state = AppState::new(source, registry, config.bootstrap_window);
    let router = broadcaster::build_router(state, config.static_dir.as_deref());

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(
        addr = %config.bind_addr,
        poll_interval_secs = config.poll_interval.as_secs_f64(),
        bootstrap_window = config.bootstrap_window,
        "broadcaster listening"
    );

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await;

    let _ = shutdown_tx.send(true);
    let _ = dispatcher_task.await;

    if let Err(e) = served {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
