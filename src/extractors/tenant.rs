//! Extract tenant identity from the request (`tenant` header) and the
//! principal bound by the external authentication layer.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

/// Header name carrying the tenant key on every inbound request.
pub const TENANT_HEADER: &str = "tenant";

/// Read the tenant key from request headers. Blank values count as absent.
pub fn tenant_key_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extractor for the optional tenant key from the `tenant` header.
#[derive(Clone, Debug)]
pub struct TenantKey(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantKey
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(TenantKey(tenant_key_from_headers(&parts.headers)))
    }
}

/// Authenticated principal, inserted as a request extension by the external
/// token-verification collaborator. The gate only reads the tenant claim.
#[derive(Clone, Debug)]
pub struct AuthPrincipal {
    pub subject: String,
    pub tenant: String,
}
