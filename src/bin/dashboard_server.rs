use std::{net::SocketAddr, sync::Arc};

use arena_market::{
    currency_config_from_env, dashboard_router, init_logging, load_snapshot_bundle, log_app_bind,
    log_app_start, log_config_loaded, log_source_selected, logging_config_from_env,
    server_config_from_env, CurrencyConfig, InMemorySnapshotSource, MarketSnapshot, ServerConfig,
    SnapshotSource, SourceSelection,
};
#[cfg(feature = "portal")]
use arena_market::{portal_config_from_env, LivePortalSnapshotSource, PortalClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let server_cfg = server_config_from_env()?;
    let currency = currency_config_from_env()?;
    log_config_loaded(&server_cfg, &currency);

    let addr: SocketAddr = server_cfg.bind_addr.parse()?;
    let source = source_from_env(&server_cfg, currency)?;
    let app = dashboard_router(source);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn source_from_env(
    server_cfg: &ServerConfig,
    currency: CurrencyConfig,
) -> Result<Arc<dyn SnapshotSource>, Box<dyn std::error::Error>> {
    if let Some(path) = &server_cfg.snapshot_path {
        let inputs = load_snapshot_bundle(path)?;
        log_source_selected(&SourceSelection::Bundle { path: path.clone() });
        return Ok(Arc::new(InMemorySnapshotSource::from_inputs(inputs, currency)));
    }
    live_source(server_cfg, currency)
}

#[cfg(feature = "portal")]
fn live_source(
    server_cfg: &ServerConfig,
    currency: CurrencyConfig,
) -> Result<Arc<dyn SnapshotSource>, Box<dyn std::error::Error>> {
    let portal_cfg = portal_config_from_env()?;
    if portal_cfg.token.is_none() {
        return Ok(empty_source("RPG_TOKEN unset", currency));
    }

    let client = PortalClient::from_config(portal_cfg)?;
    log_source_selected(&SourceSelection::LivePortal {
        refresh_interval_ms: server_cfg.refresh_interval_ms,
    });
    Ok(Arc::new(LivePortalSnapshotSource::spawn(
        client,
        currency,
        server_cfg.refresh_interval_ms,
    )))
}

#[cfg(not(feature = "portal"))]
fn live_source(
    _server_cfg: &ServerConfig,
    currency: CurrencyConfig,
) -> Result<Arc<dyn SnapshotSource>, Box<dyn std::error::Error>> {
    Ok(empty_source("portal_feature_disabled", currency))
}

fn empty_source(reason: &'static str, currency: CurrencyConfig) -> Arc<dyn SnapshotSource> {
    log_source_selected(&SourceSelection::Empty { reason });
    Arc::new(InMemorySnapshotSource::new(MarketSnapshot::empty(currency)))
}
