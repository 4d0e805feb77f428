//! # Tech World Binary
//!
//! The entry point that assembles the server from the compiled-in plugins.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tw_api::AppState;
use tw_auth_jwt::JwtTokenIssuer;
use tw_config::{DatabaseSettings, DbBackend, LogFormat, LogSettings, Settings};
use tw_core::traits::DocumentStore;

#[cfg(feature = "db-mongo")]
use secrecy::ExposeSecret;
#[cfg(feature = "db-mongo")]
use tw_db_mongo::MongoDocumentStore;

#[cfg(feature = "db-sqlite")]
use tw_db_sqlite::SqliteDocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);
    if let Some(path) = &settings.dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    // 1. Initialize Database Implementation
    let store = open_store(&settings.database).await?;
    info!(backend = ?settings.database.backend, database = %settings.database.name, "document store ready");

    // 2. Initialize Auth Implementation
    let tokens = Arc::new(JwtTokenIssuer::new(
        &settings.auth.token_secret,
        Duration::from_secs(settings.auth.token_ttl_secs),
    ));
    if !settings.auth.enforce {
        tracing::warn!("bearer tokens are issued but not required by any route (auth.enforce = false)");
    }

    // 3. Wrap in AppState (dynamic dispatch keeps the plugins swappable)
    let app = tw_api::router(AppState {
        store: store.clone(),
        tokens,
        enforce_auth: settings.auth.enforce,
    });

    let address = settings.server.bind_addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, "Tech world server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("server stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);

    match log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(database: &DatabaseSettings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match database.backend {
        #[cfg(feature = "db-mongo")]
        DbBackend::Mongo => {
            let uri = database.mongo_uri();
            let store = MongoDocumentStore::connect(uri.expose_secret(), &database.name)
                .await
                .context("failed to open MongoDB store")?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "db-sqlite")]
        DbBackend::Sqlite => {
            let store = SqliteDocumentStore::new(&database.sqlite_url)
                .await
                .with_context(|| format!("failed to open {}", database.sqlite_url))?;
            store.ping().await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("database backend {other:?} is not compiled into this binary"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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
}
