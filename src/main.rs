use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tubeforge::server::config::ServerConfig;
use tubeforge::server::{providers, tasks};
use tubeforge::state::{ChannelRegistry, PackageStore};
use tubeforge::version::VERSION;
use tubeforge::web::{create_axum_router, AppState};
use tubeforge::workflow::CancelToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "tubeforge.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal(shutdown: CancelToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, cancelling in-flight workflows.");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting tubeforge, version: {}", VERSION);

    let registry = Arc::new(ChannelRegistry::new());
    let packages = Arc::new(PackageStore::new());
    let orchestrator = Arc::new(providers::build_orchestrator(
        &server_config,
        registry.clone(),
        packages.clone(),
    )?);
    let shutdown = CancelToken::new();

    // --- Package Cleanup Task ---
    let cleanup_task = tokio::spawn(tasks::run_package_cleanup(
        packages.clone(),
        Duration::from_secs(server_config.cleanup_interval_secs.max(1)),
        server_config.package_max_age(),
        shutdown.clone(),
    ));
    info!(
        interval_seconds = server_config.cleanup_interval_secs,
        max_age_hours = server_config.package_max_age_hours,
        "Package cleanup task started."
    );

    let app_state = Arc::new(AppState {
        registry,
        packages,
        orchestrator,
        config: server_config.clone(),
        shutdown: shutdown.clone(),
    });
    let app = create_axum_router(app_state);

    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(Box::new)?;

    shutdown.cancel();
    let _ = cleanup_task.await;
    info!("Server stopped.");
    Ok(())
}
