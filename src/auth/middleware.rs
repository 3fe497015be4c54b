//! Session extractors
//!
//! Load the request's session from its cookie so handlers receive typed
//! values instead of reading cookies themselves.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::CookieJar;

use super::profile::UserProfile;
use super::session::Session;
use crate::AppState;

/// Extractor for the current session
///
/// Never fails: a missing or invalid cookie yields an empty session.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentSession(session): CurrentSession) -> impl IntoResponse {
///     format!("logged in: {}", session.is_logged_in())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentSession(session));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let session = app_state.sessions.get(&jar);
        parts.extensions.insert(session.clone());

        Ok(CurrentSession(session))
    }
}

/// Extractor for the signed-in user
///
/// Redirects to the home page when nobody is logged in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = match CurrentSession::from_request_parts(parts, state).await {
            Ok(CurrentSession(session)) => session,
            Err(never) => match never {},
        };
        session
            .user
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to("/"))
    }
}
