//! Process-wide gateway configuration from environment variables.

use std::time::Duration;

/// Schema name for the gateway's master tables. From env `GATEWAY_SCHEMA`,
/// default `gateway`. Must be a valid PostgreSQL identifier.
pub fn gateway_schema() -> String {
    std::env::var("GATEWAY_SCHEMA").unwrap_or_else(|_| "gateway".into())
}

/// Settings shared by every component of the gateway. Built once at startup;
/// per-route rate policies are declared at the call site instead.
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    /// Connection string of the master database holding tenant records.
    pub master_database_url: String,
    /// Driver identifier folded into every tenant registration payload.
    pub driver: String,
    /// Redis connection string for the distributed counter store. When unset,
    /// callers fall back to the in-process counter store.
    pub redis_url: Option<String>,
    /// Per-tenant pool sizing.
    pub tenant_pool_max_connections: u32,
    pub tenant_pool_acquire_timeout: Duration,
    /// Upper bound on any single backing-store call (tenant fetch, counter
    /// increment). Hitting it is treated as an infrastructure failure.
    pub store_timeout: Duration,
}

impl GatewaySettings {
    pub fn from_env() -> Self {
        let master_database_url = std::env::var("MASTER_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "postgres://localhost/tenantgate".into());
        let driver = std::env::var("GATEWAY_DRIVER").unwrap_or_else(|_| "postgres".into());
        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let tenant_pool_max_connections = env_u64("TENANT_POOL_MAX_CONNECTIONS", 5) as u32;
        let tenant_pool_acquire_timeout =
            Duration::from_secs(env_u64("TENANT_POOL_ACQUIRE_TIMEOUT_SECS", 10));
        let store_timeout = Duration::from_millis(env_u64("STORE_TIMEOUT_MILLIS", 2000));
        GatewaySettings {
            master_database_url,
            driver,
            redis_url,
            tenant_pool_max_connections,
            tenant_pool_acquire_timeout,
            store_timeout,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            master_database_url: "postgres://localhost/tenantgate".into(),
            driver: "postgres".into(),
            redis_url: None,
            tenant_pool_max_connections: 5,
            tenant_pool_acquire_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_millis(2000),
        }
    }
}
