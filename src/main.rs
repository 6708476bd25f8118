use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use image_upload_service::config::ServiceConfig;
use image_upload_service::infrastructure::{database, storage};
use image_upload_service::services::clock::SystemClock;
use image_upload_service::services::lifecycle::LifecycleManager;
use image_upload_service::services::record_store::SeaOrmRecordStore;
use image_upload_service::services::worker::ReconcileWorker;
use image_upload_service::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP surface only
    Api,
    /// Background reconciliation only
    Worker,
    /// Both in one process
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Temporary image upload reservations", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Use development tunables instead of reading them from the environment
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_upload_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting image upload service ({:?} mode)...", args.mode);

    let db = database::setup_database().await?;
    let object_storage = storage::setup_storage().await?;

    let config = if args.dev {
        ServiceConfig::development()
    } else {
        ServiceConfig::from_env()
    };
    info!(
        "⚙️  Upload window={}s, Max bulk={}, Key prefix='{}', Reconcile every {}s",
        config.upload_window_secs,
        config.max_bulk_count,
        config.key_prefix,
        config.reconcile_interval_secs
    );

    let lifecycle = Arc::new(LifecycleManager::new(
        Arc::new(SeaOrmRecordStore::new(db.clone())),
        object_storage,
        Arc::new(SystemClock),
        &config,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker_handle = if args.mode != Mode::Api {
        let worker = ReconcileWorker::new(
            lifecycle.clone(),
            config.reconcile_interval(),
            shutdown_rx.clone(),
        );
        Some(tokio::spawn(worker.run()))
    } else {
        None
    };

    if args.mode == Mode::Worker {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    } else {
        let state = AppState {
            db,
            lifecycle,
            config,
        };

        let app = create_app(state).layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        info!("✅ Server ready at http://{}", addr);
        info!("📖 Swagger UI: http://{}/swagger-ui", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            })
            .await?;
    }

    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!("❌ Reconcile worker ended abnormally: {}", e);
        }
    }

    info!("🛑 Shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
