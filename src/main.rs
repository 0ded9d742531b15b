use quit_tracker::clock::SystemClock;
use quit_tracker::storage::FileSlot;
use quit_tracker::{router, AppState, Config, QuitStore};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let slot = FileSlot::new(&config.data_dir);
    let store = QuitStore::open(slot, Arc::new(SystemClock)).await;
    info!(
        data_dir = %config.data_dir.display(),
        streak_days = store.streak_days(),
        "record loaded"
    );

    let app = router(AppState::new(store));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
