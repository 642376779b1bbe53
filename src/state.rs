//! Shared gateway state threaded through the admission middleware.

use crate::error::GateError;
use crate::limiter::{CounterStore, MemoryCounterStore, RateLimiter, RedisCounterStore};
use crate::registry::TenantRegistry;
use crate::router::{ConnectionRouter, SqlxPoolOpener};
use crate::settings::GatewaySettings;
use crate::store::PgTenantStore;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<TenantRegistry>,
    pub router: Arc<ConnectionRouter>,
    pub limiter: Arc<RateLimiter>,
    /// Driver identifier folded into every tenant registration payload.
    pub driver: String,
}

impl GatewayState {
    /// Assemble production state: Postgres-backed tenant store over the
    /// master pool, lazy sqlx pool opener, and a Redis counter store when
    /// `REDIS_URL` is configured (in-process counters otherwise).
    pub async fn from_settings(
        settings: &GatewaySettings,
        master_pool: PgPool,
    ) -> Result<Self, GateError> {
        let store = Arc::new(PgTenantStore::new(master_pool));
        let registry = Arc::new(TenantRegistry::new(store, settings.store_timeout));
        let router = Arc::new(ConnectionRouter::new(Arc::new(SqlxPoolOpener::new(settings))));
        let counter: Arc<dyn CounterStore> = match &settings.redis_url {
            Some(url) => Arc::new(
                RedisCounterStore::connect(url)
                    .await
                    .map_err(|e| GateError::RateLimiterUnavailable(e.to_string()))?,
            ),
            None => {
                tracing::warn!("REDIS_URL unset; rate limit counters are process-local");
                Arc::new(MemoryCounterStore::new())
            }
        };
        let limiter = Arc::new(RateLimiter::new(counter, settings.store_timeout));
        Ok(GatewayState {
            registry,
            router,
            limiter,
            driver: settings.driver.clone(),
        })
    }
}
