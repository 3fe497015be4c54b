//! HTML pages
//!
//! Home page, profile page and the generic error page. All interpolated
//! values are HTML-escaped.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use axum::http::StatusCode;

use crate::auth::UserProfile;
use crate::error::AppError;

/// Data for the home page
#[derive(Debug)]
pub struct HomePage<'a> {
    pub site_title: &'a str,
    /// Stylesheet URL under the asset mount, if assets are served
    pub stylesheet: Option<&'a str>,
    /// Provider keys, sorted
    pub providers: Vec<String>,
    /// Provider key to display name
    pub providers_map: BTreeMap<String, String>,
    pub user: Option<&'a UserProfile>,
}

impl HomePage<'_> {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

fn page_head(out: &mut String, title: &str, stylesheet: Option<&str>) -> std::fmt::Result {
    write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{}</title>
"#,
        html_escape::encode_text(title)
    )?;
    if let Some(href) = stylesheet {
        writeln!(
            out,
            r#"  <link rel="stylesheet" href="{}" />"#,
            html_escape::encode_double_quoted_attribute(href)
        )?;
    }
    writeln!(out, "</head>")
}

/// Render the home page
///
/// # Errors
/// Returns `AppError::Render` if the page cannot be written
pub fn render_home(page: &HomePage<'_>) -> Result<String, AppError> {
    let mut out = String::new();
    page_head(&mut out, page.site_title, page.stylesheet)?;

    writeln!(
        out,
        r#"<body data-logged-in="{}">
  <h1>{}</h1>"#,
        page.is_logged_in(),
        html_escape::encode_text(page.site_title)
    )?;

    if let Some(user) = page.user {
        writeln!(out, r#"  <section class="current-user">"#)?;
        if let Some(avatar) = &user.avatar_url {
            writeln!(
                out,
                r#"    <img class="avatar" src="{}" alt="" width="48" height="48" />"#,
                html_escape::encode_double_quoted_attribute(avatar)
            )?;
        }
        writeln!(
            out,
            r#"    <p>Signed in as <strong class="user-name">{}</strong> via {}</p>"#,
            html_escape::encode_text(user.display_name()),
            html_escape::encode_text(
                page.providers_map
                    .get(&user.provider)
                    .map(String::as_str)
                    .unwrap_or(user.provider.as_str())
            )
        )?;
        if let Some(email) = &user.email {
            writeln!(
                out,
                r#"    <p class="user-email">{}</p>"#,
                html_escape::encode_text(email)
            )?;
        }
        writeln!(
            out,
            r#"    <p><a href="/profile">Profile</a> &middot; <a href="/logout/{}">Log out</a></p>
  </section>"#,
            urlencoding::encode(&user.provider)
        )?;
    }

    writeln!(out, r#"  <ul class="providers">"#)?;
    for key in &page.providers {
        let name = page.providers_map.get(key).map(String::as_str).unwrap_or(key.as_str());
        writeln!(
            out,
            r#"    <li><a class="provider provider-{}" href="/auth/{}">Log in with {}</a></li>"#,
            html_escape::encode_double_quoted_attribute(key),
            urlencoding::encode(key),
            html_escape::encode_text(name)
        )?;
    }
    writeln!(out, "  </ul>\n</body>\n</html>")?;

    Ok(out)
}

/// Render every field of the signed-in user's profile
///
/// # Errors
/// Returns `AppError::Render` if the page cannot be written
pub fn render_profile(
    site_title: &str,
    stylesheet: Option<&str>,
    user: &UserProfile,
) -> Result<String, AppError> {
    let mut out = String::new();
    page_head(
        &mut out,
        &format!("{} - {}", user.display_name(), site_title),
        stylesheet,
    )?;

    writeln!(out, "<body>\n  <h1>{}</h1>", html_escape::encode_text(user.display_name()))?;
    if let Some(avatar) = &user.avatar_url {
        writeln!(
            out,
            r#"  <img class="avatar" src="{}" alt="" width="96" height="96" />"#,
            html_escape::encode_double_quoted_attribute(avatar)
        )?;
    }

    let expires_at = user.expires_at.map(|at| at.to_rfc3339());
    let rows: [(&str, Option<&str>); 8] = [
        ("Provider", Some(user.provider.as_str())),
        ("User ID", Some(user.user_id.as_str())),
        ("Name", user.name.as_deref()),
        ("Nickname", user.nick_name.as_deref()),
        ("Email", user.email.as_deref()),
        ("Access token", Some(user.access_token.as_str())),
        ("Refresh token", user.refresh_token.as_deref()),
        ("Expires at", expires_at.as_deref()),
    ];

    writeln!(out, r#"  <dl class="profile">"#)?;
    for (label, value) in rows {
        writeln!(
            out,
            "    <dt>{}</dt><dd>{}</dd>",
            label,
            html_escape::encode_text(value.unwrap_or("-"))
        )?;
    }
    writeln!(
        out,
        r#"  </dl>
  <p><a href="/">Home</a> &middot; <a href="/logout/{}">Log out</a></p>
</body>
</html>"#,
        urlencoding::encode(&user.provider)
    )?;

    Ok(out)
}

/// Generic error page; never includes internal error detail
pub fn error_page(status: StatusCode, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{code} {reason}</title>
</head>
<body>
  <h1>{code} {reason}</h1>
  <p>{message}</p>
  <p><a href="/">Back to the home page</a></p>
</body>
</html>"#,
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
        message = html_escape::encode_text(message)
    )
}
