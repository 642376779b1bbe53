//! Example gateway: a separate Rust project that wires tenantgate-sdk into a
//! runnable server.
//!
//! Run from repo root: `cargo run -p example-gateway`
//! Or from this directory: `cargo run`

use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use tenantgate_sdk::{
    active_pool, active_tenant_key, common_routes_with_ready, ensure_database_exists,
    ensure_gateway_tables, GateError, GatewaySettings, GatewayState, RatePolicy, RequestGate,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenantgate_sdk=info")),
        )
        .init();

    let settings = GatewaySettings::from_env();
    ensure_database_exists(&settings.master_database_url).await?;
    let master_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.master_database_url)
        .await?;
    ensure_gateway_tables(&master_pool).await?;

    let state = GatewayState::from_settings(&settings, master_pool.clone()).await?;

    // Business routes behind the admission gate: 10 requests per minute per
    // source address for this demo operation.
    let gated = RequestGate::new(state, RatePolicy::new("demo:", 60, 10).per_ip())
        .attach(Router::new().route("/whoami", get(whoami)));

    let app = common_routes_with_ready(master_pool)
        .merge(gated)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(
        "Example gateway listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Downstream business handler: reads the routed tenant's pool from the
/// request context and probes it.
async fn whoami() -> Result<Json<serde_json::Value>, GateError> {
    let tenant = active_tenant_key()?;
    let pool = active_pool()?;
    let probe: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
    Ok(Json(serde_json::json!({
        "tenant": tenant,
        "probe": probe.0
    })))
}
