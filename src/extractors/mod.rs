//! Request extractors for the tenant header and the authenticated principal.

mod tenant;
pub use tenant::{tenant_key_from_headers, AuthPrincipal, TenantKey, TENANT_HEADER};
