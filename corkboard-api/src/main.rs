use axum::http::header::InvalidHeaderValue;
use config::Env;
use corkboard_common::model::auth::SessionIssuer;
use corkboard_db::{
    Database, DbError, accounts::CredentialStore, client::DbClient, feed::FeedAssembler,
    memory::MemoryDb, posts::PostStore,
};
use corkboard_media::{
    MediaBridge,
    cloudinary::{CloudinaryError, CloudinaryStore},
};
use server::{HttpSettings, ServerState};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error setting up the media store: {0}")]
    Media(#[from] CloudinaryError),
    #[error("Invalid CORS origin: {0}")]
    Origin(#[from] InvalidHeaderValue),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "corkboard_api=debug,\
                corkboard_db=debug,\
                corkboard_media=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_database(env: &Env) -> Result<Arc<dyn Database>, InitError> {
    let Some(url) = &env.database_url else {
        warn!("DATABASE_URL is not set, data is kept in memory and lost on exit");
        return Ok(Arc::new(MemoryDb::new()));
    };

    let client = DbClient::connect(url, env.database_max_connections).await?;
    client.migrate().await?;
    info!("Connected to PostgreSQL");

    Ok(Arc::new(client))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(%err, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                warn!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    debug!(?env, "Loaded configuration");

    let db = open_database(&env).await?;
    let credentials = CredentialStore::new(Arc::clone(&db));
    let media = CloudinaryStore::new(env.cloudinary())?;

    let state = ServerState {
        credentials: credentials.clone(),
        sessions: Arc::new(SessionIssuer::new(env.jwt_secret.as_bytes())),
        posts: PostStore::new(db),
        feed: FeedAssembler::new(credentials),
        media: MediaBridge::new(Arc::new(media)),
    };
    let settings = HttpSettings {
        allowed_origins: env.allowed_origins()?,
        max_upload_bytes: env.max_upload_bytes,
    };
    let app = server::app(state, &settings);

    let server_address = env.socket_address();
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
