use std::net::SocketAddr;

use medprep_backend::config::Config;
use medprep_backend::db::{self, Database};
use medprep_backend::logging;
use medprep_backend::create_app_with;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config.log_level);

    let database = match Database::from_env().await {
        Ok(database) => Some(database),
        Err(db::DbInitError::MissingUrl) => {
            tracing::warn!("DATABASE_URL not set, starting without storage");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "database not initialized");
            None
        }
    };

    let addr = config.bind_addr();
    let app = create_app_with(config, database);

    tracing::info!(%addr, "medprep-backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
