//! OAuth 2.0 identity providers
//!
//! Implements the authorization code flow against Google, GitHub, VK, or any
//! provider configured with explicit endpoints. Each provider knows how to
//! build its authorization URL and how to turn a callback code into a
//! [`UserProfile`].

use std::time::Duration;

use axum::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::profile::UserProfile;
use crate::config::{AppConfig, ProviderConfig};
use crate::error::{AppError, AuthFailure};

const VK_API_VERSION: &str = "5.131";

/// A provider that can authenticate a browser and return who it is
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying `state` for CSRF protection
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange the callback `code` for the user's profile
    async fn exchange(&self, code: &str) -> Result<UserProfile, AuthFailure>;
}

/// How a provider's profile endpoint is queried and parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    /// Bearer-authenticated JSON object (Google, OIDC-style userinfo)
    Standard,
    /// GitHub `/user`, falling back to `/user/emails` when the email is private
    Github,
    /// VK `users.get` method call
    Vk,
}

/// Built-in endpoint set for a well-known provider
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub display_name: &'static str,
    pub auth_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    pub scopes: &'static [&'static str],
    pub format: ProfileFormat,
}

/// Look up the preset for a provider key
pub fn preset(key: &str) -> Option<Preset> {
    match key {
        "google" => Some(Preset {
            display_name: "Google",
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo",
            scopes: &["openid", "email", "profile"],
            format: ProfileFormat::Standard,
        }),
        "github" => Some(Preset {
            display_name: "Github",
            auth_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            userinfo_url: "https://api.github.com/user",
            scopes: &["read:user", "user:email"],
            format: ProfileFormat::Github,
        }),
        "vk" => Some(Preset {
            display_name: "VK",
            auth_url: "https://oauth.vk.com/authorize",
            token_url: "https://oauth.vk.com/access_token",
            userinfo_url: "https://api.vk.com/method/users.get",
            scopes: &["email"],
            format: ProfileFormat::Vk,
        }),
        _ => None,
    }
}

/// Token endpoint response
///
/// GitHub reports failures with HTTP 200 and an `error` field, so every
/// field is optional.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
    /// VK returns the email alongside the token
    email: Option<String>,
}

/// Entry of GitHub's `/user/emails` list
#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// Authorization code flow client for one provider
#[derive(Debug, Clone)]
pub struct OAuth2Provider {
    key: String,
    client_id: String,
    client_secret: String,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    /// Only set for GitHub-style providers
    emails_url: Option<Url>,
    redirect_url: String,
    scopes: Vec<String>,
    format: ProfileFormat,
    http_client: reqwest::Client,
}

impl OAuth2Provider {
    /// Build a provider from its configuration entry
    ///
    /// Keys without a preset must configure all three endpoints.
    ///
    /// # Errors
    /// Returns `AppError::Config` for missing or invalid endpoints
    pub fn from_config(
        key: &str,
        provider: &ProviderConfig,
        config: &AppConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, AppError> {
        let preset = preset(key);

        let endpoint = |field: &str,
                        configured: &Option<String>,
                        fallback: Option<&str>|
         -> Result<Url, AppError> {
            let raw = configured.as_deref().or(fallback).ok_or_else(|| {
                AppError::Config(format!(
                    "auth.providers.{key}.{field} is required for providers without a preset"
                ))
            })?;
            Url::parse(raw).map_err(|e| {
                AppError::Config(format!("auth.providers.{key}.{field} is invalid: {e}"))
            })
        };

        let auth_url = endpoint("auth_url", &provider.auth_url, preset.map(|p| p.auth_url))?;
        let token_url = endpoint("token_url", &provider.token_url, preset.map(|p| p.token_url))?;
        let userinfo_url = endpoint(
            "userinfo_url",
            &provider.userinfo_url,
            preset.map(|p| p.userinfo_url),
        )?;

        let format = preset.map(|p| p.format).unwrap_or(ProfileFormat::Standard);
        let emails_url = match format {
            ProfileFormat::Github => Some(emails_url_for(&userinfo_url).ok_or_else(|| {
                AppError::Config(format!("auth.providers.{key}.userinfo_url cannot have a path"))
            })?),
            ProfileFormat::Standard | ProfileFormat::Vk => None,
        };

        let scopes = provider.scopes.clone().unwrap_or_else(|| {
            preset
                .map(|p| p.scopes.iter().map(ToString::to_string).collect())
                .unwrap_or_default()
        });

        Ok(Self {
            key: key.to_string(),
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            auth_url,
            token_url,
            userinfo_url,
            emails_url,
            redirect_url: config.callback_url(key),
            scopes,
            format,
            http_client,
        })
    }

    async fn request_token(&self, code: &str) -> Result<TokenResponse, AuthFailure> {
        let response = self
            .http_client
            .post(self.token_url.clone())
            .header(http::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream("token request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::Upstream(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| upstream("token response", e))?;

        if let Some(error) = &token.error {
            return Err(AuthFailure::Upstream(format!(
                "token endpoint returned error {error}: {}",
                token.error_description.as_deref().unwrap_or("no description")
            )));
        }

        Ok(token)
    }

    async fn request_profile(&self, access_token: &str) -> Result<Value, AuthFailure> {
        let request = match self.format {
            ProfileFormat::Standard | ProfileFormat::Github => self
                .http_client
                .get(self.userinfo_url.clone())
                .bearer_auth(access_token),
            ProfileFormat::Vk => self.http_client.get(self.userinfo_url.clone()).query(&[
                ("fields", "photo_200,screen_name"),
                ("access_token", access_token),
                ("v", VK_API_VERSION),
            ]),
        };

        let response = request
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| upstream("profile request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::Upstream(format!(
                "profile endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| upstream("profile response", e))
    }

    async fn request_primary_email(
        &self,
        emails_url: &Url,
        access_token: &str,
    ) -> Result<Option<String>, AuthFailure> {
        let response = self
            .http_client
            .get(emails_url.clone())
            .bearer_auth(access_token)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| upstream("email request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::Upstream(format!(
                "email endpoint returned {status}"
            )));
        }

        let emails: Vec<GithubEmail> = response
            .json()
            .await
            .map_err(|e| upstream("email response", e))?;

        Ok(primary_verified_email(emails))
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_url)
                .append_pair("state", state);
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
        }
        url.to_string()
    }

    async fn exchange(&self, code: &str) -> Result<UserProfile, AuthFailure> {
        let token = self.request_token(code).await?;
        let access_token = token
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthFailure::Upstream("token response missing access_token".to_string()))?;

        let raw = self.request_profile(&access_token).await?;
        let mut profile = match self.format {
            ProfileFormat::Standard | ProfileFormat::Github => {
                parse_standard_profile(&self.key, &raw)?
            }
            ProfileFormat::Vk => parse_vk_profile(&self.key, &raw)?,
        };

        if profile.email.is_none() {
            profile.email = token.email;
        }
        if let Some(emails_url) = self.emails_url.as_ref().filter(|_| profile.email.is_none()) {
            // Lookup failures leave the email empty
            match self.request_primary_email(emails_url, &access_token).await {
                Ok(email) => profile.email = email,
                Err(e) => tracing::warn!(
                    provider = %self.key,
                    error = %e,
                    "Could not fetch primary email"
                ),
            }
        }
        profile.access_token = access_token;
        profile.refresh_token = token.refresh_token;
        profile.expires_at = token
            .expires_in
            .filter(|seconds| *seconds > 0)
            .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds));

        tracing::debug!(
            provider = %self.key,
            user_id = %profile.user_id,
            "Fetched user profile"
        );

        Ok(profile)
    }
}

/// Shared HTTP client for provider calls
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("socialgate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| AppError::Internal(e.into()))
}

/// `<userinfo_url>/emails`, e.g. `https://api.github.com/user/emails`
fn emails_url_for(userinfo_url: &Url) -> Option<Url> {
    let mut url = userinfo_url.clone();
    url.path_segments_mut().ok()?.pop_if_empty().push("emails");
    url.set_query(None);
    Some(url)
}

fn primary_verified_email(emails: Vec<GithubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|entry| entry.primary && entry.verified)
        .map(|entry| entry.email)
}

fn upstream(stage: &str, error: reqwest::Error) -> AuthFailure {
    if error.is_timeout() {
        AuthFailure::Upstream(format!("{stage} timed out"))
    } else {
        AuthFailure::Upstream(format!("{stage} failed: {error}"))
    }
}

/// First present field among `keys`, accepting strings and numbers
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn empty_profile(provider: &str, user_id: String) -> UserProfile {
    UserProfile {
        provider: provider.to_string(),
        user_id,
        name: None,
        nick_name: None,
        email: None,
        avatar_url: None,
        access_token: String::new(),
        refresh_token: None,
        expires_at: None,
    }
}

/// Google (`sub`, `picture`), GitHub (`id`, `login`, `avatar_url`) and
/// OIDC-style userinfo documents
fn parse_standard_profile(provider: &str, raw: &Value) -> Result<UserProfile, AuthFailure> {
    let user_id = string_field(raw, &["sub", "id"])
        .ok_or_else(|| AuthFailure::Upstream("profile response missing user id".to_string()))?;

    Ok(UserProfile {
        name: string_field(raw, &["name"]),
        nick_name: string_field(raw, &["preferred_username", "login", "nickname"]),
        email: string_field(raw, &["email"]),
        avatar_url: string_field(raw, &["picture", "avatar_url"]),
        ..empty_profile(provider, user_id)
    })
}

/// VK wraps users in `{"response": [ ... ]}` and reports API errors in-band
fn parse_vk_profile(provider: &str, raw: &Value) -> Result<UserProfile, AuthFailure> {
    if let Some(error) = raw.get("error") {
        let message = string_field(error, &["error_msg"]).unwrap_or_else(|| "unknown".to_string());
        return Err(AuthFailure::Upstream(format!("users.get failed: {message}")));
    }

    let user = raw
        .get("response")
        .and_then(|users| users.get(0))
        .ok_or_else(|| AuthFailure::Upstream("users.get returned no user".to_string()))?;
    let user_id = string_field(user, &["id"])
        .ok_or_else(|| AuthFailure::Upstream("profile response missing user id".to_string()))?;

    let name = [
        string_field(user, &["first_name"]),
        string_field(user, &["last_name"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    Ok(UserProfile {
        name: Some(name).filter(|n| !n.is_empty()),
        nick_name: string_field(user, &["screen_name"]),
        avatar_url: string_field(user, &["photo_200"]),
        ..empty_profile(provider, user_id)
    })
}
