//! Signed-in user profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity attributes returned by a provider after a successful login
///
/// Copied into the session verbatim; nothing in the gateway inspects it
/// beyond the provider key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider key ("google", "github", ...)
    pub provider: String,
    /// Provider-side user ID
    pub user_id: String,
    /// Display name
    pub name: Option<String>,
    /// Login / handle, where the provider has one
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access token expiry, if the provider reported one
    pub expires_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Best name to greet the user with
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.nick_name.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.user_id)
    }
}
