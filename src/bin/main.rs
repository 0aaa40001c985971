//! Podwatch entry point
//!
//! Pending-pod monitor: background polling loop, pending-pod HTML view,
//! liveness probe, and a Prometheus scrape endpoint on its own port.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use podwatch::client::{KubeClient, PendingPods};
use podwatch::config::MonitorConfig;
use podwatch::handler::{create_router, metrics_router, AppState};
use podwatch::notify::{build_channels, Dispatcher};
use podwatch::telemetry::MonitorMetrics;
use podwatch::watcher::PendingWatcher;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "podwatch")]
#[command(about = "Pending pod monitor - change-triggered cluster alerting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitor: polling loop, HTML view, metrics endpoint
    Serve {
        /// Port for the pending-pod view and liveness probe
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Port for the Prometheus scrape endpoint
        #[arg(long, default_value = "2112", env = "METRICS_PORT")]
        metrics_port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Poll interval in seconds (overrides PODWATCH_INTERVAL_SECS)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Explicit kubeconfig path (overrides KUBECONFIG)
        #[arg(long)]
        kubeconfig: Option<PathBuf>,
    },

    /// One-shot query: print the current pending pods and exit
    Check {
        /// Explicit kubeconfig path (overrides KUBECONFIG)
        #[arg(long, env = "KUBECONFIG")]
        kubeconfig: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            metrics_port,
            host,
            interval_secs,
            kubeconfig,
        } => {
            let mut config = MonitorConfig::from_env()?;
            if let Some(secs) = interval_secs {
                config.poll_interval = Duration::from_secs(secs);
            }
            if let Some(path) = kubeconfig {
                config.kubeconfig = Some(path);
            }

            let client = Arc::new(KubeClient::connect(config.kubeconfig.as_deref())?);
            let pods: Arc<dyn PendingPods> = client;

            let metrics = Arc::new(MonitorMetrics::new()?);
            let channels = build_channels(&config, Arc::clone(&metrics))?;
            if channels.is_empty() {
                tracing::warn!("no notification channels enabled, transitions will only be logged");
            }
            let dispatcher = Dispatcher::new(channels, config.fail_fast)
                .with_metrics(Arc::clone(&metrics));
            tracing::info!(
                channels = ?dispatcher.channel_names(),
                fail_fast = config.fail_fast,
                interval_secs = config.poll_interval.as_secs(),
                "starting podwatch"
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
            });

            let watcher = PendingWatcher::new(
                Arc::clone(&pods),
                dispatcher,
                Arc::clone(&metrics),
                config.poll_interval,
            );
            let watcher_task = tokio::spawn(watcher.run(shutdown_rx.clone()));

            let metrics_addr: SocketAddr = format!("{host}:{metrics_port}").parse()?;
            let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
            tracing::info!(%metrics_addr, "metrics endpoint listening");
            tokio::spawn(
                axum::serve(metrics_listener, metrics_router(Arc::clone(&metrics)))
                    .into_future(),
            );

            let state = Arc::new(AppState::new(pods, metrics)?);
            let router = create_router(state);
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "http endpoint listening");

            let mut shutdown = shutdown_rx;
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await?;

            let _ = watcher_task.await;
        }

        Commands::Check { kubeconfig } => {
            let client = KubeClient::connect(kubeconfig.as_deref())?;
            match client.pending_pods().await {
                Ok(pods) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "pending": pods.len(),
                            "pods": pods,
                        })
                    );
                }
                Err(error) => {
                    eprintln!("Error fetching pending pods: {error}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
