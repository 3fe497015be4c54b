//! HTML pages
//!
//! - GET / - home page with provider list and login state
//! - GET /profile - signed-in user's profile

use axum::{Router, extract::State, response::Html, routing::get};

use crate::AppState;
use crate::auth::{CurrentSession, CurrentUser};
use crate::error::AppError;
use crate::view::{self, HomePage};

/// Create pages router
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/profile", get(profile))
}

/// GET /
async fn home(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Html<String>, AppError> {
    let registry = state.gateway.registry();
    let stylesheet = state.config.assets.stylesheet_url();
    let page = HomePage {
        site_title: &state.config.site.title,
        stylesheet: stylesheet.as_deref(),
        providers: registry.keys(),
        providers_map: registry.display_names(),
        user: session.user.as_ref(),
    };

    Ok(Html(view::render_home(&page)?))
}

/// GET /profile
///
/// Redirects to the home page when logged out.
async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let stylesheet = state.config.assets.stylesheet_url();
    Ok(Html(view::render_profile(
        &state.config.site.title,
        stylesheet.as_deref(),
        &user,
    )?))
}
