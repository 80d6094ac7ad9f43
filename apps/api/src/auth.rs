//! Request identity.
//!
//! Sign-in happens upstream (passwordless email links); the identity gateway
//! forwards the authenticated user as `x-user-id` / `x-user-email`. Handlers
//! receive it as a [`Session`] and pass it into each manager explicitly.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::UserProfile;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner_id: Uuid,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let owner_id = header(USER_ID_HEADER)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(AppError::Unauthorized)?;
        let email = header(USER_EMAIL_HEADER)
            .ok_or(AppError::Unauthorized)?
            .to_string();

        Ok(Session { owner_id, email })
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
}

impl ProfileResponse {
    fn from_session(session: &Session) -> Self {
        Self {
            id: session.owner_id,
            email: session.email.clone(),
            full_name: None,
            avatar_url: None,
            company: None,
            role: None,
        }
    }
}

impl From<UserProfile> for ProfileResponse {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            avatar_url: p.avatar_url,
            company: p.company,
            role: p.role,
        }
    }
}

/// GET /api/v1/me
///
/// Falls back to the session identity when the provider has not created a
/// profile row yet.
pub async fn handle_me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state.profiles.fetch_profile(session.owner_id).await?;
    Ok(Json(
        profile
            .map(ProfileResponse::from)
            .unwrap_or_else(|| ProfileResponse::from_session(&session)),
    ))
}
