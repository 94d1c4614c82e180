//! Auth routes — password login, logout, and the session extractor.

use axum::extract::{FromRef, State};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::routes::error::{ApiError, ApiJson};
use crate::services::{auth as auth_svc, session};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::Unauthorized);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self { user })
    }
}

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

/// `POST /auth/login` — verify credentials, start a session, set the cookie.
pub async fn login(State(state): State<AppState>, jar: CookieJar, ApiJson(body): ApiJson<LoginBody>) -> Response {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return login_failed();
    };

    let user = match auth_svc::verify_credentials(&state.pool, &email, &password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(%email, "login rejected");
            return login_failed();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    match session::delete_expired_sessions(&state.pool).await {
        Ok(removed) if removed > 0 => info!(removed, "swept expired sessions"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "expired session sweep failed"),
    }

    let token = match session::create_session(&state.pool, user.identifier, state.config.session_ttl_days).await {
        Ok(token) => token,
        Err(e) => return ApiError::from(e).into_response(),
    };

    info!(user_identifier = user.identifier, "login succeeded");
    let cookie = session_cookie(token, state.config.cookie_secure, Duration::days(state.config.session_ttl_days));
    let body = serde_json::json!({ "success": true, "errors": [], "user": user });
    (jar.add(cookie), Json(body)).into_response()
}

fn login_failed() -> Response {
    Json(serde_json::json!({
        "success": false,
        "errors": [auth_svc::LOGIN_FAILED],
        "user": null,
    }))
    .into_response()
}

/// `POST /auth/logout` — delete the session if there is one and clear the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = jar.get(COOKIE_NAME).map(|c| c.value().to_owned()) {
        if let Err(e) = session::delete_session(&state.pool, &token).await {
            warn!(error = %e, "session delete failed during logout");
        }
    }

    let cleared = session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    (jar.add(cleared), Json(serde_json::json!({ "success": true, "errors": [] }))).into_response()
}

/// `GET /auth/me` — return the current user.
pub async fn me(auth: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "errors": [], "user": auth.user }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
