//! OAuth login
//!
//! Handles:
//! - Provider registry and OAuth 2.0 providers
//! - Cookie-backed session management
//! - Login/logout routes

mod gateway;
mod middleware;
mod oauth;
pub mod profile;
pub mod provider;
pub mod registry;
pub mod session;

pub use gateway::{AuthGateway, CallbackParams, LOGIN_STATE_COOKIE, LoginRedirect};
pub use middleware::{CurrentSession, CurrentUser};
pub use oauth::auth_router;
pub use profile::UserProfile;
pub use provider::{IdentityProvider, OAuth2Provider};
pub use registry::ProviderRegistry;
pub use session::{Session, SessionStore};
