//! Auth routes: email/password and anonymous sign-in, sessions, WS tickets.
//!
//! Every sign-in path ends the same way: a fresh session token is set as an
//! `HttpOnly` cookie and also returned in the body for clients that prefer
//! an `Authorization: Bearer` header.

use axum::extract::{FromRef, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::services::auth::{self as auth_svc, AuthError, SignupRequest};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the bearer header or session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await
            .map_err(ApiError::internal)?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token })
    }
}

/// Session token from `Authorization: Bearer` first, then the cookie.
pub(crate) fn request_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    let jar = CookieJar::from_headers(headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

pub(crate) fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::MissingFields | AuthError::PasswordMismatch | AuthError::InvalidEmail | AuthError::TermsNotAccepted => {
            StatusCode::BAD_REQUEST
        }
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Hash(_) | AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::from_service(auth_status(&err), &err)
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

async fn start_session(state: &AppState, user_id: Uuid) -> Result<Response, ApiError> {
    let token = session::create_session(&state.pool, user_id)
        .await
        .map_err(ApiError::internal)?;
    let user = session::validate_session(&state.pool, &token)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::internal(format!("session for {user_id} vanished")))?;

    let jar = CookieJar::new().add(session_cookie(token.clone(), state.config.cookie_secure));
    Ok((jar, Json(SessionResponse { token, user })).into_response())
}

/// `POST /api/auth/signup`: validate the form, create the account, sign in.
pub async fn signup(State(state): State<AppState>, Json(body): Json<SignupRequest>) -> Result<Response, ApiError> {
    let account = auth_svc::validate_signup(&body)?;
    let user_id = auth_svc::sign_up(&state.pool, &account).await?;
    tracing::info!(%user_id, account_type = account.account_type.as_str(), "auth: signed up");
    start_session(&state, user_id).await
}

/// `POST /api/auth/login`
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<Response, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AuthError::MissingFields.into());
    }
    let user_id = auth_svc::log_in(&state.pool, &body.email, &body.password).await?;
    start_session(&state, user_id).await
}

/// `POST /api/auth/anonymous`: create a throwaway student account.
pub async fn anonymous(State(state): State<AppState>) -> Result<Response, ApiError> {
    let user_id = auth_svc::sign_in_anonymously(&state.pool).await?;
    tracing::info!(%user_id, "auth: anonymous sign-in");
    start_session(&state, user_id).await
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(user_id = %auth.user.id, error = %e, "auth: session delete failed");
    }

    let jar = CookieJar::new().add(cleared_cookie(state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
