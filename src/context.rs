//! Request-scoped routing context.
//!
//! The active tenant is bound to the current task via `tokio::task_local!`,
//! never to a worker thread: executions resumed on another worker keep their
//! binding, and a reused worker never sees a previous request's tenant. The
//! binding is entered with [`scope`], whose exit is the teardown path for
//! every outcome (return, error, panic unwind, cancellation).

use crate::error::GateError;
use sqlx::PgPool;
use std::future::Future;

tokio::task_local! {
    static ACTIVE_TENANT: ActiveTenant;
}

/// The tenant bound to the current request, with its pool handle.
#[derive(Clone)]
pub struct ActiveTenant {
    pub tenant_key: String,
    pub pool: PgPool,
}

/// Run `fut` with `active` as the current request's tenant binding. The
/// binding is dropped when `fut` completes, however it completes.
pub async fn scope<F>(active: ActiveTenant, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE_TENANT.scope(active, fut).await
}

/// Tenant key bound to the current task. Fails with `NoActiveTenant` when
/// called outside a request scope; that is a programmer defect, not a
/// client error.
pub fn active_tenant_key() -> Result<String, GateError> {
    ACTIVE_TENANT
        .try_with(|t| t.tenant_key.clone())
        .map_err(|_| GateError::NoActiveTenant)
}

/// Pool handle bound to the current task, for downstream business code.
pub fn active_pool() -> Result<PgPool, GateError> {
    ACTIVE_TENANT
        .try_with(|t| t.pool.clone())
        .map_err(|_| GateError::NoActiveTenant)
}
