//! TenantGate SDK: multi-tenant admission gateway library.
//!
//! Two request-scoped gates run in front of business logic: tenant-aware
//! connection routing (each request is attributed to one tenant whose pool is
//! lazily registered and bound to the request's task) and distributed rate
//! limiting (an atomic fixed-window counter over a shared store). See
//! [`gate::RequestGate`] for the pipeline.

pub mod context;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod limiter;
pub mod registry;
pub mod router;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;

pub use context::{active_pool, active_tenant_key, ActiveTenant};
pub use error::GateError;
pub use extractors::{AuthPrincipal, TenantKey, TENANT_HEADER};
pub use gate::RequestGate;
pub use limiter::{
    rate_key, CounterError, CounterStore, LimitType, MemoryCounterStore, RateDecision,
    RateLimiter, RatePolicy, RedisCounterStore,
};
pub use registry::{ConnectionParams, TenantRecord, TenantRegistry, TenantStatus, TenantStore};
pub use router::{ConnectionRouter, PoolOpener, SqlxPoolOpener};
pub use routes::{common_routes, common_routes_with_ready};
pub use settings::{gateway_schema, GatewaySettings};
pub use state::GatewayState;
pub use store::{ensure_database_exists, ensure_gateway_tables, PgTenantStore};
