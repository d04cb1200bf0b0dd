pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::config::{Settings, StorageBackend, StoreBackend};
use crate::core::{state::AppState, telemetry};
use crate::repositories::{InMemoryStore, PgStore, ReviewStore};
use crate::services::email::SmtpMailer;
use crate::services::notifications::StoreNotificationSink;
use crate::services::storage::{BlobStore, LocalBlobStore, S3BlobStore};

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn ReviewStore>> {
    match settings.database().backend {
        StoreBackend::Postgres => {
            let db_pool = db::init_pool(settings).await?;
            db::run_migrations(&db_pool).await?;
            tracing::info!("Postgres store ready");
            Ok(Arc::new(PgStore::new(db_pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

async fn open_blobs(settings: &Settings) -> anyhow::Result<Arc<dyn BlobStore>> {
    let local_root = &settings.storage().local_root;
    match settings.storage().backend {
        StorageBackend::S3 => match S3BlobStore::from_settings(settings).await? {
            Some(s3) => {
                tracing::info!(bucket = %settings.s3().bucket, "S3 blob storage ready");
                Ok(Arc::new(s3))
            }
            None => {
                tracing::warn!(
                    root = %local_root,
                    "S3 credentials are not configured; falling back to local storage"
                );
                Ok(Arc::new(LocalBlobStore::new(local_root)))
            }
        },
        StorageBackend::Local => {
            tracing::info!(root = %local_root, "Local blob storage ready");
            Ok(Arc::new(LocalBlobStore::new(local_root)))
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = open_store(&settings).await?;
    let blobs = open_blobs(&settings).await?;
    let mut sink = StoreNotificationSink::new(store.clone());
    match SmtpMailer::from_settings(settings.email()) {
        Ok(Some(mailer)) => {
            tracing::info!("Notification emails enabled");
            sink = sink.with_mailer(Arc::new(mailer));
        }
        Ok(None) => tracing::info!("SMTP_HOST not configured; notification emails disabled"),
        Err(err) => tracing::warn!(error = %err, "Invalid SMTP settings; emails disabled"),
    }
    let sink = Arc::new(sink);
    let state = AppState::new(settings, store, blobs, sink);

    if let Err(err) = core::bootstrap::ensure_superuser(&state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "TaskReview API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    tracing::info!("TaskReview API stopped");
    Ok(())
}
