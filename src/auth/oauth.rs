//! OAuth login routes
//!
//! Implements the OAuth 2.0 authorization code flow for every registered
//! provider.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;

use super::gateway::CallbackParams;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::LOGOUTS_TOTAL;

/// Create authentication router
///
/// Routes:
/// - GET /auth/:provider - Redirect to the provider
/// - GET /auth/:provider/callback - OAuth callback
/// - GET /logout, GET /logout/:provider - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider", get(begin_login))
        .route("/auth/:provider/callback", get(login_callback))
        .route("/logout", get(logout))
        .route("/logout/:provider", get(logout_provider))
}

// =============================================================================
// Login
// =============================================================================

/// GET /auth/:provider
///
/// # Steps
/// 1. Reject unknown providers
/// 2. Reuse the session if it already holds a user from this provider
/// 3. Otherwise store a CSRF state cookie and redirect to the provider
async fn begin_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let session = state.sessions.get(&jar);

    if let Some(user) = state.gateway.check_existing_session(&session, &provider)? {
        tracing::debug!(
            provider = %provider,
            user_id = %user.user_id,
            "Session already logged in with provider"
        );
        return Ok(Redirect::to("/").into_response());
    }

    let redirect = state.gateway.begin_login(&provider)?;
    let jar = jar.add(redirect.state_cookie);

    Ok((jar, Redirect::to(&redirect.authorization_url)).into_response())
}

/// GET /auth/:provider/callback
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for the user's profile
/// 3. Store the profile in the session, replacing any previous user
/// 4. Redirect to home
///
/// On failure the session cookie is left untouched.
async fn login_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user = state.gateway.complete_login(&provider, &params, &jar).await?;

    let session = state.sessions.login(user);
    let jar = state.sessions.save(&session, jar)?;
    let jar = state.gateway.clear_login_state(jar);

    Ok((jar, Redirect::to("/")).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears the session cookie and redirects to home.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let session = state.sessions.get(&jar);
    LOGOUTS_TOTAL
        .with_label_values(&[if session.is_logged_in() { "true" } else { "false" }])
        .inc();

    let session = state.gateway.logout(session);
    let jar = state.sessions.save(&session, jar)?;

    Ok((jar, Redirect::to("/")).into_response())
}

/// GET /logout/:provider
///
/// Same as `/logout`; the provider segment is accepted for links that carry it.
async fn logout_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    tracing::debug!(provider = %provider, "Logout requested for provider");
    logout(State(state), jar).await
}
