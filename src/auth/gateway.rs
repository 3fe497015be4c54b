//! Authentication gateway
//!
//! Sits between the routes and the identity providers:
//! - starts a login by redirecting to the provider with a signed CSRF state
//! - completes a login from the provider's callback
//! - reuses an existing session for the same provider
//! - logs out
//!
//! Only the completed-login path produces a [`UserProfile`] for the session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::UserProfile;
use super::registry::ProviderRegistry;
use super::session::{Session, create_signed_token, verify_signed_token};
use crate::error::{AppError, AuthFailure};
use crate::metrics::{LOGIN_ATTEMPTS_TOTAL, LOGINS_TOTAL, PROVIDER_EXCHANGE_DURATION_SECONDS};

/// Cookie carrying the pending login's CSRF state
pub const LOGIN_STATE_COOKIE: &str = "oauth_state";
const LOGIN_STATE_TTL_SECONDS: i64 = 600;

/// Query parameters a provider sends to the callback route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Pending login, signed into the state cookie
#[derive(Debug, Serialize, Deserialize)]
struct LoginState {
    provider: String,
    state: String,
    expires_at: DateTime<Utc>,
}

/// Where to send the browser to start a login
#[derive(Debug)]
pub struct LoginRedirect {
    pub authorization_url: String,
    pub state_cookie: Cookie<'static>,
}

pub struct AuthGateway {
    registry: Arc<ProviderRegistry>,
    secret: String,
    secure_cookies: bool,
    upstream_timeout: Duration,
}

impl AuthGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        secret: impl Into<String>,
        secure_cookies: bool,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            secret: secret.into(),
            secure_cookies,
            upstream_timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Start the provider's login flow
    ///
    /// # Errors
    /// Returns `AppError::UnknownProvider` for unregistered keys
    pub fn begin_login(&self, provider: &str) -> Result<LoginRedirect, AppError> {
        let entry = self.registry.get(provider)?;

        let state = generate_csrf_state();
        let pending = LoginState {
            provider: provider.to_string(),
            state: state.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(LOGIN_STATE_TTL_SECONDS),
        };
        let token = create_signed_token(&pending, &self.secret)?;

        let state_cookie = Cookie::build((LOGIN_STATE_COOKIE, token))
            .path("/auth")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .build();

        LOGIN_ATTEMPTS_TOTAL.with_label_values(&[provider]).inc();
        tracing::info!(provider = %provider, "Redirecting to provider for login");

        Ok(LoginRedirect {
            authorization_url: entry.provider.authorization_url(&state),
            state_cookie,
        })
    }

    /// Finish a login from the provider's callback
    ///
    /// Never retries; the user has to start over on failure.
    ///
    /// # Errors
    /// - `AppError::UnknownProvider` for unregistered keys
    /// - `AppError::AuthExchange` for denied logins, bad state, or a failed exchange
    pub async fn complete_login(
        &self,
        provider: &str,
        params: &CallbackParams,
        jar: &CookieJar,
    ) -> Result<UserProfile, AppError> {
        let entry = self.registry.get(provider)?;

        let result = self.exchange(provider, entry, params, jar).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        LOGINS_TOTAL.with_label_values(&[provider, outcome]).inc();

        let profile = result?;
        tracing::info!(
            provider = %provider,
            user_id = %profile.user_id,
            "User logged in"
        );
        Ok(profile)
    }

    async fn exchange(
        &self,
        provider: &str,
        entry: &super::registry::RegisteredProvider,
        params: &CallbackParams,
        jar: &CookieJar,
    ) -> Result<UserProfile, AuthFailure> {
        if let Some(error) = &params.error {
            let detail = match &params.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            return Err(AuthFailure::Denied(detail));
        }

        self.verify_state(provider, params.state.as_deref(), jar)?;

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(AuthFailure::InvalidState)?;

        let started = Instant::now();
        let exchanged = tokio::time::timeout(self.upstream_timeout, entry.provider.exchange(code)).await;
        PROVIDER_EXCHANGE_DURATION_SECONDS
            .with_label_values(&[provider])
            .observe(started.elapsed().as_secs_f64());

        let mut profile = exchanged.map_err(|_| {
            AuthFailure::Upstream(format!(
                "exchange timed out after {}s",
                self.upstream_timeout.as_secs()
            ))
        })??;

        // The session is keyed on the route's provider, whatever the implementation reported.
        profile.provider = provider.to_string();
        Ok(profile)
    }

    fn verify_state(
        &self,
        provider: &str,
        state: Option<&str>,
        jar: &CookieJar,
    ) -> Result<(), AuthFailure> {
        let state = state.filter(|s| !s.is_empty()).ok_or(AuthFailure::InvalidState)?;
        let cookie = jar.get(LOGIN_STATE_COOKIE).ok_or(AuthFailure::InvalidState)?;
        let pending: LoginState =
            verify_signed_token(cookie.value(), &self.secret).ok_or(AuthFailure::InvalidState)?;

        if pending.provider != provider || pending.state != state || pending.expires_at < Utc::now() {
            return Err(AuthFailure::InvalidState);
        }

        Ok(())
    }

    /// Remove the pending-login cookie after a completed login
    pub fn clear_login_state(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = Cookie::build((LOGIN_STATE_COOKIE, String::new()))
            .path("/auth")
            .http_only(true)
            .build();
        cookie.make_removal();
        jar.add(cookie)
    }

    /// Profile already held by the session for `provider`, if any
    ///
    /// A profile whose access token has expired does not count; the caller
    /// starts a fresh login instead.
    ///
    /// # Errors
    /// Returns `AppError::UnknownProvider` for unregistered keys
    pub fn check_existing_session<'a>(
        &self,
        session: &'a Session,
        provider: &str,
    ) -> Result<Option<&'a UserProfile>, AppError> {
        self.registry.get(provider)?;
        let now = Utc::now();
        Ok(session.user.as_ref().filter(|user| {
            user.provider == provider && user.expires_at.is_none_or(|at| at > now)
        }))
    }

    /// Drop the signed-in user; calling it on a logged-out session is a no-op
    pub fn logout(&self, mut session: Session) -> Session {
        if let Some(user) = session.user.take() {
            tracing::info!(
                provider = %user.provider,
                user_id = %user.user_id,
                "User logged out"
            );
        }
        session
    }
}

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
