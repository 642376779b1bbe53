//! Tenant records and the registry that resolves and validates them per request.

use crate::error::GateError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Tenant lifecycle state as stored in the master record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Disabled,
}

impl std::str::FromStr for TenantStatus {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "disabled" => Ok(TenantStatus::Disabled),
            other => Err(GateError::Db(sqlx::Error::Decode(
                format!("invalid tenant status: {}", other).into(),
            ))),
        }
    }
}

/// One tenant's master record. Immutable once fetched for a request; the
/// authoritative copy lives in the backing store.
#[derive(Clone, Debug)]
pub struct TenantRecord {
    pub tenant_key: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub status: TenantStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Registration payload handed to the connection router: record fields plus
/// the process-wide configured driver identifier.
#[derive(Clone, Debug)]
pub struct ConnectionParams {
    pub driver: String,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl TenantRecord {
    pub fn connection_params(&self, driver: &str) -> ConnectionParams {
        ConnectionParams {
            driver: driver.to_string(),
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Contract the gateway requires from the tenant metadata store.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn fetch(&self, tenant_key: &str) -> Result<Option<TenantRecord>, GateError>;
}

/// Resolves tenant keys against the backing store and validates the result.
/// No caching of records or validity: tenant state can change between
/// requests, so both checks run on every admission.
pub struct TenantRegistry {
    store: Arc<dyn TenantStore>,
    timeout: Duration,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn TenantStore>, timeout: Duration) -> Self {
        TenantRegistry { store, timeout }
    }

    /// Look up a tenant's master record. Store calls are bounded by the
    /// configured timeout.
    pub async fn resolve(&self, tenant_key: &str) -> Result<TenantRecord, GateError> {
        let fetched = tokio::time::timeout(self.timeout, self.store.fetch(tenant_key))
            .await
            .map_err(|_| GateError::Db(sqlx::Error::PoolTimedOut))??;
        fetched.ok_or_else(|| GateError::TenantNotFound(tenant_key.to_string()))
    }

    /// Reject disabled tenants before expired ones; both are re-checked on
    /// every request.
    pub fn validate(&self, record: &TenantRecord, now: DateTime<Utc>) -> Result<(), GateError> {
        if record.status == TenantStatus::Disabled {
            return Err(GateError::TenantDisabled(record.tenant_key.clone()));
        }
        if let Some(expires_at) = record.expires_at {
            if expires_at < now {
                return Err(GateError::TenantExpired(record.tenant_key.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct MapTenantStore {
        records: HashMap<String, TenantRecord>,
    }

    impl MapTenantStore {
        fn new(records: Vec<TenantRecord>) -> Self {
            MapTenantStore {
                records: records
                    .into_iter()
                    .map(|r| (r.tenant_key.clone(), r))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl TenantStore for MapTenantStore {
        async fn fetch(&self, tenant_key: &str) -> Result<Option<TenantRecord>, GateError> {
            Ok(self.records.get(tenant_key).cloned())
        }
    }

    fn record(key: &str, status: TenantStatus, expires_at: Option<DateTime<Utc>>) -> TenantRecord {
        TenantRecord {
            tenant_key: key.to_string(),
            url: format!("postgres://localhost/{}", key),
            username: "app".into(),
            password: "secret".into(),
            status,
            expires_at,
        }
    }

    fn registry(records: Vec<TenantRecord>) -> TenantRegistry {
        TenantRegistry::new(
            Arc::new(MapTenantStore::new(records)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let reg = registry(vec![]);
        let err = reg.resolve("ghost").await.unwrap_err();
        assert!(matches!(err, GateError::TenantNotFound(k) if k == "ghost"));
    }

    #[tokio::test]
    async fn active_tenant_resolves_and_validates() {
        let reg = registry(vec![record("acme", TenantStatus::Active, None)]);
        let rec = reg.resolve("acme").await.unwrap();
        assert!(reg.validate(&rec, Utc::now()).is_ok());
    }

    #[test]
    fn disabled_wins_over_expired() {
        let reg = registry(vec![]);
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let rec = record("acme", TenantStatus::Disabled, Some(past));
        let err = reg.validate(&rec, Utc::now()).unwrap_err();
        assert!(matches!(err, GateError::TenantDisabled(_)));
    }

    #[test]
    fn expired_tenant_is_rejected() {
        let reg = registry(vec![]);
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let rec = record("acme", TenantStatus::Active, Some(past));
        let err = reg.validate(&rec, Utc::now()).unwrap_err();
        assert!(matches!(err, GateError::TenantExpired(_)));
    }

    #[test]
    fn unexpired_tenant_passes() {
        let reg = registry(vec![]);
        let future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        let rec = record("acme", TenantStatus::Active, Some(future));
        assert!(reg.validate(&rec, Utc::now()).is_ok());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Active".parse::<TenantStatus>().unwrap(), TenantStatus::Active);
        assert_eq!("DISABLED".parse::<TenantStatus>().unwrap(), TenantStatus::Disabled);
        assert!("archived".parse::<TenantStatus>().is_err());
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        struct SlowStore;

        #[async_trait]
        impl TenantStore for SlowStore {
            async fn fetch(&self, _tenant_key: &str) -> Result<Option<TenantRecord>, GateError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            }
        }

        let reg = TenantRegistry::new(Arc::new(SlowStore), Duration::from_millis(20));
        let err = reg.resolve("acme").await.unwrap_err();
        assert!(matches!(err, GateError::Db(sqlx::Error::PoolTimedOut)));
    }
}
