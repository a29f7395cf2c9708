//! Request identity and the role policy table
//!
//! Authentication itself (sessions, JWT, middleware) is an external
//! collaborator; upstream middleware is expected to inject the verified
//! identity as trusted headers. [`CurrentUser`] is the seam where that
//! plugs in, and [`policy`] is consulted once per handler.

pub mod policy;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Identity of the staff member acting on this request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Option<Uuid>,
    pub name: String,
    pub role: String,
}

impl CurrentUser {
    fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            id: header("x-staff-id").and_then(|v| v.parse().ok()),
            name: header("x-staff-name").unwrap_or_else(|| "unknown".into()),
            role: header("x-staff-role").unwrap_or_else(|| "staff".into()),
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser::from_parts(parts))
    }
}
