//! Request admission gate: tenant routing and rate limiting around the
//! downstream handler.
//!
//! Pipeline per request, terminal on first failure: extract tenant header,
//! resolve and validate the record, cross-check the authenticated principal,
//! ensure the tenant's pool is registered, bind the routing context, admit
//! under the rate limit, invoke downstream. The context binding is dropped on
//! scope exit, so teardown runs whether the rate check, the handler, or
//! nothing at all succeeded.

use crate::context;
use crate::error::GateError;
use crate::extractors::{tenant_key_from_headers, AuthPrincipal};
use crate::limiter::{RateDecision, RatePolicy};
use crate::state::GatewayState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::Response,
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;

/// One admission gate, carrying the shared state and the guarded operation's
/// rate policy. Declared per route group at the call site.
#[derive(Clone)]
pub struct RequestGate {
    state: GatewayState,
    policy: RatePolicy,
}

impl RequestGate {
    pub fn new(state: GatewayState, policy: RatePolicy) -> Self {
        RequestGate { state, policy }
    }

    /// Wrap `router` so every route runs behind this gate.
    pub fn attach(self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self, admit))
    }
}

async fn admit(
    State(gate): State<RequestGate>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let tenant = tenant_key_from_headers(req.headers()).ok_or(GateError::TenantHeaderMissing)?;

    let record = gate.state.registry.resolve(&tenant).await?;
    gate.state.registry.validate(&record, Utc::now())?;

    if let Some(principal) = req.extensions().get::<AuthPrincipal>() {
        if !principal.tenant.eq_ignore_ascii_case(&tenant) {
            tracing::warn!(
                tenant = %tenant,
                principal_tenant = %principal.tenant,
                "request tenant does not match principal tenant"
            );
            return Err(GateError::TenantMismatch);
        }
    }

    let params = record.connection_params(&gate.state.driver);
    gate.state.router.ensure_registered(&tenant, &params).await?;
    let active = gate.state.router.activate(&tenant)?;
    tracing::info!(tenant = %tenant, "tenant routed");

    let operation = format!("{} {}", req.method(), req.uri().path());
    let client_ip = client_ip(req.headers(), connect_info);

    // Rate admission and the downstream handler both run inside the routing
    // scope; exiting it is the unconditional teardown path.
    context::scope(active, async move {
        let decision = gate
            .state
            .limiter
            .check_policy(&gate.policy, client_ip.as_deref(), &operation)
            .await?;
        if let RateDecision::Denied(count) = decision {
            return Err(GateError::RateLimitExceeded {
                count,
                limit: gate.policy.max_requests,
            });
        }
        Ok(next.run(req).await)
    })
    .await
}

/// Caller source address: first entry of `x-forwarded-for`, then `x-real-ip`,
/// then the socket peer when the server was built with connect info.
fn client_ip(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().unwrap_or(forwarded).trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let trimmed = real_ip.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.9, 172.16.0.1"),
        );
        assert_eq!(client_ip(&headers, None), Some("10.0.0.9".into()));
    }

    #[test]
    fn real_ip_is_second_choice() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.7"));
        assert_eq!(client_ip(&headers, None), Some("10.0.0.7".into()));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let peer: SocketAddr = "192.168.1.5:443".parse().unwrap();
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(ConnectInfo(peer))),
            Some("192.168.1.5".into())
        );
    }

    #[test]
    fn no_source_yields_none() {
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
