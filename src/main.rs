use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use freebusy::config::Config;
use freebusy::engine::Engine;
use freebusy::http::{self, AppState};
use freebusy::source::IcsRoster;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("FREEBUSY_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    freebusy::observability::init(metrics_port);

    let port = std::env::var("FREEBUSY_PORT").unwrap_or_else(|_| "8000".into());
    let bind = std::env::var("FREEBUSY_BIND").unwrap_or_else(|_| "0.0.0.0".into());

    let config = Config::from_env()?;
    let source = Arc::new(IcsRoster::new(config.roster.clone(), config.timezone));
    let engine = Arc::new(Engine::new(config.clone(), source));
    let app = http::router(AppState { engine });

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("freebusy listening on {addr}");
    info!("  agents: {}", config.roster.len());
    info!("  timezone: {}", config.timezone);
    info!(
        "  business hours: {:02}:00-{:02}:00",
        config.business_hours.open_hour, config.business_hours.close_hour
    );
    info!("  window: {} .. {}", config.window.start, config.window.end);
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c; in-flight
    // requests are stateless and finish on their own.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("freebusy stopped");
    Ok(())
}
