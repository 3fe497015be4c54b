//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::profile::UserProfile;
use crate::config::AppConfig;
use crate::error::AppError;

/// User session data
///
/// Stored in a signed cookie. Holds at most one signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Currently signed-in user
    pub user: Option<UserProfile>,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// An empty (logged-out) session valid for `max_age_seconds`
    pub fn empty(max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            user: None,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Create a signed token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `payload` - Data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_signed_token<T: Serialize>(payload: &T, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize payload to JSON
    let payload = serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a signed token
///
/// Returns `None` if the token is malformed or the signature does not match.
pub fn verify_signed_token<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let (payload_b64, signature_b64) = token.split_once('.')?;
    if signature_b64.contains('.') {
        return None;
    }

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .ok()?;
    mac.verify_slice(&expected_signature).ok()?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    serde_json::from_slice(&payload_bytes).ok()
}

/// Cookie-backed session store
///
/// Constructed once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    secret: String,
    cookie_name: String,
    max_age_seconds: i64,
    secure: bool,
}

impl SessionStore {
    pub fn new(
        secret: impl Into<String>,
        cookie_name: impl Into<String>,
        max_age_seconds: i64,
        secure: bool,
    ) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: cookie_name.into(),
            max_age_seconds,
            secure,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.auth.session_secret.clone(),
            config.auth.session_cookie.clone(),
            config.auth.session_max_age,
            config.should_use_secure_cookies(),
        )
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Load the session for a request
    ///
    /// Missing, tampered, or expired cookies yield an empty session.
    pub fn get(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Session::empty(self.max_age_seconds);
        };

        match verify_signed_token::<Session>(cookie.value(), &self.secret) {
            Some(session) if !session.is_expired() => session,
            Some(_) => {
                tracing::debug!("Session cookie expired");
                Session::empty(self.max_age_seconds)
            }
            None => {
                tracing::debug!("Ignoring session cookie with invalid signature");
                Session::empty(self.max_age_seconds)
            }
        }
    }

    /// Write the session back to the response cookies
    ///
    /// A logged-out session removes the cookie instead of storing an
    /// empty payload.
    pub fn save(&self, session: &Session, jar: CookieJar) -> Result<CookieJar, AppError> {
        if !session.is_logged_in() {
            return Ok(self.clear(jar));
        }

        let token = create_signed_token(session, &self.secret)?;
        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age_seconds))
            .build();

        Ok(jar.add(cookie))
    }

    /// Start a fresh session holding `user`, replacing anything stored before
    pub fn login(&self, user: UserProfile) -> Session {
        Session {
            user: Some(user),
            ..Session::empty(self.max_age_seconds)
        }
    }

    fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = Cookie::build((self.cookie_name.clone(), String::new()))
            .path("/")
            .http_only(true)
            .build();
        cookie.make_removal();
        jar.add(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    fn store() -> SessionStore {
        SessionStore::new(SECRET, "session", 3600, false)
    }

    fn user(name: &str) -> UserProfile {
        UserProfile {
            provider: "google".to_string(),
            user_id: "1001".to_string(),
            name: Some(name.to_string()),
            nick_name: None,
            email: Some("jane@example.com".to_string()),
            avatar_url: None,
            access_token: "ya29.token".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    fn jar_from_response(jar: CookieJar, name: &str) -> CookieJar {
        let value = jar.get(name).expect("cookie set").value().to_string();
        CookieJar::new().add(Cookie::new(name.to_string(), value))
    }

    #[test]
    fn get_without_cookie_returns_empty_session() {
        let session = store().get(&CookieJar::new());
        assert!(!session.is_logged_in());
        assert!(!session.is_expired());
    }

    #[test]
    fn saved_session_is_read_back() {
        let store = store();
        let session = store.login(user("Jane"));

        let jar = store.save(&session, CookieJar::new()).expect("save");
        let restored = store.get(&jar_from_response(jar, "session"));

        assert_eq!(restored.user, Some(user("Jane")));
    }

    #[test]
    fn saved_cookie_outlives_browser_session() {
        let store = store();
        let jar = store
            .save(&store.login(user("Jane")), CookieJar::new())
            .expect("save");

        let cookie = jar.get("session").expect("cookie set");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let store = store();
        let jar = store
            .save(&store.login(user("Jane")), CookieJar::new())
            .expect("save");
        let token = jar.get("session").expect("cookie").value().to_string();
        let (payload, signature) = token.split_once('.').expect("token shape");

        let forged = create_signed_token(&store.login(user("Mallory")), "another-secret-32-bytes-long!!!!")
            .expect("sign");
        let (forged_payload, _) = forged.split_once('.').expect("token shape");
        assert_ne!(payload, forged_payload);

        let tampered = CookieJar::new().add(Cookie::new("session", format!("{forged_payload}.{signature}")));
        assert!(!store.get(&tampered).is_logged_in());
    }

    #[test]
    fn expired_session_is_ignored() {
        let store = store();
        let mut session = store.login(user("Jane"));
        session.expires_at = Utc::now() - Duration::seconds(1);

        let jar = store.save(&session, CookieJar::new()).expect("save");
        assert!(!store.get(&jar_from_response(jar, "session")).is_logged_in());
    }

    #[test]
    fn saving_logged_out_session_removes_cookie() {
        let store = store();
        let jar = store
            .save(&Session::empty(3600), CookieJar::new())
            .expect("save");

        let cookie = jar.get("session").expect("removal cookie");
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().is_some_and(|age| age.is_zero()));
    }

    #[test]
    fn login_replaces_previous_user() {
        let store = store();
        let first = store.login(user("Jane"));
        assert_eq!(first.user.as_ref().map(|u| u.provider.as_str()), Some("google"));

        let second = store.login(UserProfile {
            provider: "github".to_string(),
            ..user("Octo")
        });

        let restored = second.user.expect("user");
        assert_eq!(restored.provider, "github");
        assert_eq!(restored.name.as_deref(), Some("Octo"));
    }

    #[test]
    fn verify_rejects_malformed_tokens() {
        assert!(verify_signed_token::<Session>("", SECRET).is_none());
        assert!(verify_signed_token::<Session>("abc", SECRET).is_none());
        assert!(verify_signed_token::<Session>("a.b.c", SECRET).is_none());
        assert!(verify_signed_token::<Session>("!!!.???", SECRET).is_none());
    }
}
