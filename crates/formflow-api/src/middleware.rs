//! Request identity and CORS.
//!
//! Identity comes from `x-user-*` headers set by whatever sits in front of
//! the API; nothing here authenticates.
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use tower_http::cors::CorsLayer;

use formflow_core::User;

pub const ANONYMOUS: &str = "anonymous";

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub role: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, "x-user-id").unwrap_or_else(|| ANONYMOUS.to_string());
        let name = header(parts, "x-user-name").unwrap_or_else(|| id.clone());
        let mut user = User::new(id, name);
        if let Some(email) = header(parts, "x-user-email") {
            user = user.with_email(email);
        }

        Ok(CurrentUser {
            user,
            role: header(parts, "x-user-role"),
        })
    }
}
