//! Master-database tenant store. Gateway tables live in a schema named from
//! `GATEWAY_SCHEMA` env (default `gateway`).

use crate::error::GateError;
use crate::registry::{TenantRecord, TenantStore};
use crate::settings::gateway_schema;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Returns the schema-qualified name of a gateway table (e.g. "gateway._gw_tenants").
pub fn qualified_gateway_table(table: &str) -> String {
    format!("{}.{}", gateway_schema(), table)
}

/// Create the gateway schema if not exists, then the tenant master table.
/// Tenant CRUD itself is owned by the surrounding system; the gateway only
/// reads these rows.
pub async fn ensure_gateway_tables(pool: &PgPool) -> Result<(), GateError> {
    let schema = gateway_schema();
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;

    let q_tenants = qualified_gateway_table("_gw_tenants");
    let tenants_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            tenant_key TEXT PRIMARY KEY,
            db_url TEXT NOT NULL,
            db_username TEXT NOT NULL,
            db_password TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            expires_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            comment TEXT
        )
        "#,
        q_tenants
    );
    sqlx::query(&tenants_ddl).execute(pool).await?;

    Ok(())
}

/// `TenantStore` backed by the master database. One row per tenant; reads are
/// uncached so status and expiry changes take effect on the next request.
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        PgTenantStore { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn fetch(&self, tenant_key: &str) -> Result<Option<TenantRecord>, GateError> {
        let q_tenants = qualified_gateway_table("_gw_tenants");
        let sql = format!(
            "SELECT tenant_key, db_url, db_username, db_password, status, expires_at FROM {} WHERE tenant_key = $1",
            q_tenants
        );
        let row: Option<(String, String, String, String, String, Option<DateTime<Utc>>)> =
            sqlx::query_as(&sql)
                .bind(tenant_key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((tenant_key, url, username, password, status_str, expires_at)) = row else {
            return Ok(None);
        };
        let status = status_str.parse()?;
        Ok(Some(TenantRecord {
            tenant_key,
            url,
            username,
            password,
            status,
            expires_at,
        }))
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to
/// the default `postgres` database to run CREATE DATABASE. Call before
/// creating the master pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), GateError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(GateError::Db)?;
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await
            .map_err(GateError::Db)?;
    if !exists.0 {
        let quoted = quote_ident(&db_name);
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await
            .map_err(GateError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), GateError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| GateError::Db(sqlx::Error::Configuration("database url has no path".into())))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
