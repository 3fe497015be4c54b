//! In-process OAuth 2.0 provider for E2E tests
//!
//! - POST /token: `good-code` yields a token, anything else `invalid_grant`
//! - POST /slow-token: answers after the gateway's upstream timeout
//! - GET /userinfo: Jane Doe for the issued bearer token; the email is
//!   hidden for tokens issued to `PRIVATE_EMAIL_CODE`
//! - GET /userinfo/emails: GitHub-style email list

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;

pub const CLIENT_SECRET: &str = "test-client-secret";
pub const GOOD_CODE: &str = "good-code";
pub const ACCESS_TOKEN: &str = "fake-access-token";
pub const PRIVATE_EMAIL_CODE: &str = "private-email-code";
pub const PRIVATE_ACCESS_TOKEN: &str = "fake-private-access-token";
pub const PRIMARY_EMAIL: &str = "jane.primary@example.com";

/// Start the fake provider and return its base URL
pub async fn spawn() -> String {
    let app = Router::new()
        .route("/token", post(token))
        .route("/slow-token", post(slow_token))
        .route("/userinfo", get(userinfo))
        .route("/userinfo/emails", get(emails));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("client_secret").map(String::as_str) != Some(CLIENT_SECRET) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }

    let access_token = match form.get("code").map(String::as_str) {
        Some(GOOD_CODE) => ACCESS_TOKEN,
        Some(PRIVATE_EMAIL_CODE) => PRIVATE_ACCESS_TOKEN,
        _ => "",
    };
    if form.get("grant_type").map(String::as_str) != Some("authorization_code")
        || access_token.is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response();
    }

    Json(json!({
        "access_token": access_token,
        "refresh_token": "fake-refresh-token",
        "token_type": "Bearer",
        "expires_in": 3600
    }))
    .into_response()
}

async fn slow_token(form: Form<HashMap<String, String>>) -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    token(form).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| [ACCESS_TOKEN, PRIVATE_ACCESS_TOKEN].contains(token))
}

async fn userinfo(headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let email = (token == ACCESS_TOKEN).then_some("jane@example.com");
    Json(json!({
        "sub": "1001",
        "name": "Jane Doe",
        "email": email,
        "picture": "https://example.com/jane.png"
    }))
    .into_response()
}

async fn emails(headers: HeaderMap) -> Response {
    if bearer_token(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!([
        {"email": "jane.old@example.com", "primary": false, "verified": true},
        {"email": PRIMARY_EMAIL, "primary": true, "verified": true}
    ]))
    .into_response()
}
