//! Per-tenant connection pool registry with lazy, single-flight creation.

use crate::context::ActiveTenant;
use crate::error::GateError;
use crate::registry::ConnectionParams;
use crate::settings::GatewaySettings;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

/// Opens a pool for one tenant's connection parameters. A trait seam so the
/// router's creation guarantees can be exercised without a live database.
#[async_trait]
pub trait PoolOpener: Send + Sync {
    async fn open(&self, params: &ConnectionParams) -> Result<PgPool, GateError>;
}

/// Production opener: lazy sqlx pools, sized from gateway settings. Lazy
/// construction means registration never blocks on the tenant database;
/// connections are established on first acquire.
pub struct SqlxPoolOpener {
    max_connections: u32,
    acquire_timeout: std::time::Duration,
}

impl SqlxPoolOpener {
    pub fn new(settings: &GatewaySettings) -> Self {
        SqlxPoolOpener {
            max_connections: settings.tenant_pool_max_connections,
            acquire_timeout: settings.tenant_pool_acquire_timeout,
        }
    }
}

#[async_trait]
impl PoolOpener for SqlxPoolOpener {
    async fn open(&self, params: &ConnectionParams) -> Result<PgPool, GateError> {
        let opts = PgConnectOptions::from_str(&params.url)?
            .username(&params.username)
            .password(&params.password);
        tracing::debug!(driver = %params.driver, url = %params.url, "opening tenant pool");
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy_with(opts))
    }
}

/// Owns every tenant's pool handle. At most one pool exists per tenant key
/// for the lifetime of the process; there is no eviction (a retirement policy
/// is a deliberate extension point).
pub struct ConnectionRouter {
    opener: Arc<dyn PoolOpener>,
    pools: RwLock<HashMap<String, Arc<OnceCell<PgPool>>>>,
}

impl ConnectionRouter {
    pub fn new(opener: Arc<dyn PoolOpener>) -> Self {
        ConnectionRouter {
            opener,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch or insert the per-key cell. The map lock is read-mostly and is
    /// never held across an await: pool construction happens on the cell,
    /// outside the lock.
    fn cell(&self, tenant_key: &str) -> Result<Arc<OnceCell<PgPool>>, GateError> {
        if let Some(cell) = self
            .pools
            .read()
            .map_err(|_| poisoned_registry())?
            .get(tenant_key)
        {
            return Ok(cell.clone());
        }
        Ok(self
            .pools
            .write()
            .map_err(|_| poisoned_registry())?
            .entry(tenant_key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone())
    }

    /// Idempotently register a pool for `tenant_key`. Concurrent first-time
    /// callers are serialized on the key's cell: exactly one runs the opener,
    /// the rest wait and observe the same completed handle. Unrelated tenants
    /// are never serialized against each other.
    pub async fn ensure_registered(
        &self,
        tenant_key: &str,
        params: &ConnectionParams,
    ) -> Result<(), GateError> {
        let cell = self.cell(tenant_key)?;
        if cell.initialized() {
            tracing::debug!(tenant = %tenant_key, "pool already registered");
            return Ok(());
        }
        cell.get_or_try_init(|| async {
            tracing::info!(tenant = %tenant_key, "registering tenant connection pool");
            self.opener.open(params).await
        })
        .await?;
        Ok(())
    }

    /// Whether a completed pool exists for `tenant_key`.
    pub fn exists(&self, tenant_key: &str) -> bool {
        self.pools
            .read()
            .is_ok_and(|pools| pools.get(tenant_key).is_some_and(|cell| cell.initialized()))
    }

    /// The completed pool for `tenant_key`, if registered.
    pub fn pool(&self, tenant_key: &str) -> Option<PgPool> {
        self.pools
            .read()
            .ok()?
            .get(tenant_key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Build the request binding for `tenant_key`. Callers must have
    /// registered the pool first; a missing pool here is a pipeline defect.
    pub fn activate(&self, tenant_key: &str) -> Result<ActiveTenant, GateError> {
        let pool = self.pool(tenant_key).ok_or(GateError::NoActiveTenant)?;
        Ok(ActiveTenant {
            tenant_key: tenant_key.to_string(),
            pool,
        })
    }
}

fn poisoned_registry() -> GateError {
    GateError::Db(sqlx::Error::Protocol("pool registry lock".into()))
}
