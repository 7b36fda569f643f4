//! ABOUTME: Upstream identity headers: trusted, not authenticated here

use axum::http::HeaderMap;
use sage_core::CoreError;

/// The trusted upstream identity, extracted from headers. Absence or a
/// malformed role is never silently accepted on admin endpoints.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
    RootAdmin,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            "root_admin" => Some(Self::RootAdmin),
            _ => None,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse the identity headers on a request. `None` if `X-User-ID` is
/// absent, which callers treat as `authentication_required` on endpoints
/// that need it.
#[must_use]
pub fn extract(headers: &HeaderMap) -> Option<Identity> {
    let user_id = header_str(headers, "X-User-ID")?.to_string();
    let role = header_str(headers, "X-User-Role").and_then(Role::parse).unwrap_or(Role::Student);
    Some(Identity {
        user_id,
        username: header_str(headers, "X-Username").map(str::to_string),
        email: header_str(headers, "X-User-Email").map(str::to_string),
        role,
        school_id: header_str(headers, "X-School-ID").map(str::to_string),
    })
}

/// Require an admin (or root-admin) identity, for the `/admin/*` surface.
///
/// # Errors
///
/// [`CoreError::AuthenticationRequired`] if the identity headers are
/// absent; [`CoreError::Forbidden`] if present but not an admin role.
pub fn require_admin(headers: &HeaderMap) -> Result<Identity, CoreError> {
    let identity = extract(headers).ok_or(CoreError::AuthenticationRequired)?;
    if matches!(identity.role, Role::Admin | Role::RootAdmin) {
        Ok(identity)
    } else {
        Err(CoreError::Forbidden { reason: "admin endpoints require an admin role".to_string() })
    }
}
