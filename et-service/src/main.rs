use anyhow::{Context, Result};
use et_service::{
    api::{self, AppState},
    config::AppConfig,
    observability,
    store::PgReadingStore,
    EtService,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    let catalog = cfg.probe_catalog()?;
    for probe in catalog.probes() {
        tracing::info!(
            probe = %probe.name,
            table = %probe.table,
            depth_cm = ?probe.depth_cm,
            depth_weight = probe.depth_weight,
            "probe configured"
        );
    }

    let prometheus = if cfg.metrics_enabled() {
        Some(observability::install_metrics_recorder()?)
    } else {
        None
    };

    let db = cfg
        .database
        .as_ref()
        .context("missing [database] section in configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.uri)
        .await?;

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;

    let service = EtService::new(PgReadingStore::new(pool), catalog);
    let app = api::router(AppState {
        service: Arc::new(service),
        prometheus,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "et-service listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
