//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod fake_provider;

use std::collections::BTreeMap;

use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use socialgate::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider_addr: String,
    pub _assets_dir: TempDir,
}

impl TestServer {
    /// Create a new test server backed by a fake OAuth provider
    pub async fn new() -> Self {
        let provider_addr = fake_provider::spawn().await;

        // Static assets directory
        let assets_dir = TempDir::new().unwrap();
        std::fs::write(assets_dir.path().join("style.css"), "body { margin: 0; }").unwrap();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            auth: config::AuthConfig {
                session_secret: SESSION_SECRET.to_string(),
                session_max_age: 604800,
                session_cookie: "session".to_string(),
                upstream_timeout_seconds: 1,
                // Inserted out of order on purpose; the home page must sort them.
                providers: BTreeMap::from([
                    ("google".to_string(), fake_provider_config(&provider_addr, None, "/token")),
                    ("acme".to_string(), fake_provider_config(&provider_addr, Some("Acme ID"), "/token")),
                    ("github".to_string(), fake_provider_config(&provider_addr, None, "/token")),
                    ("slow".to_string(), fake_provider_config(&provider_addr, Some("Slow"), "/slow-token")),
                ]),
            },
            assets: config::AssetsConfig {
                dir: assets_dir.path().to_path_buf(),
                mount_paths: vec!["/assets".to_string(), "/src".to_string()],
            },
            site: config::SiteConfig {
                title: "Test Gate".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).expect("state");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = socialgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            provider_addr,
            _assets_dir: assets_dir,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// A browser with its own cookie jar
    pub fn browser(&self) -> Browser {
        Browser {
            base: self.addr.clone(),
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build no-redirect client"),
            cookies: BTreeMap::new(),
        }
    }
}

fn fake_provider_config(
    provider_addr: &str,
    display_name: Option<&str>,
    token_path: &str,
) -> config::ProviderConfig {
    config::ProviderConfig {
        client_id: "test-client-id".to_string(),
        client_secret: fake_provider::CLIENT_SECRET.to_string(),
        display_name: display_name.map(ToString::to_string),
        scopes: Some(vec!["profile".to_string()]),
        auth_url: Some(format!("{provider_addr}/authorize")),
        token_url: Some(format!("{provider_addr}{token_path}")),
        userinfo_url: Some(format!("{provider_addr}/userinfo")),
    }
}

/// Minimal cookie-keeping client that never follows redirects
pub struct Browser {
    base: String,
    client: reqwest::Client,
    pub cookies: BTreeMap<String, String>,
}

impl Browser {
    pub async fn get(&mut self, path: &str) -> reqwest::Response {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(COOKIE, header);
        }

        let response = request.send().await.expect("request succeeds");
        self.store_cookies(&response);
        response
    }

    fn store_cookies(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let raw = value.to_str().expect("ascii cookie");
            let Some((name, value)) = raw.split(';').next().and_then(|pair| pair.split_once('='))
            else {
                continue;
            };
            let removed = value.is_empty() || raw.to_ascii_lowercase().contains("max-age=0");
            if removed {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }
    }

    /// Start a login and return the state the provider would echo back
    pub async fn begin_login(&mut self, provider: &str) -> String {
        let response = self.get(&format!("/auth/{provider}")).await;
        assert_eq!(response.status(), 303);

        let location = location(&response);
        let url = url::Url::parse(&location).expect("absolute provider url");
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state parameter")
    }

    /// Run the whole login flow with the code the fake provider should see
    pub async fn login(&mut self, provider: &str, code: &str) -> reqwest::Response {
        let state = self.begin_login(provider).await;
        self.get(&format!(
            "/auth/{provider}/callback?code={}&state={}",
            urlencoding::encode(code),
            urlencoding::encode(&state)
        ))
        .await
    }

    pub async fn home_body(&mut self) -> String {
        let response = self.get("/").await;
        assert_eq!(response.status(), 200);
        response.text().await.expect("response body")
    }
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
