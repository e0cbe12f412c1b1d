use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_auth::config::RateLimitRule;
use gatehouse_auth::mailer::Mailer;
use gatehouse_auth::{
    AccessTokenClaims, AuthResult, Collaborators, Environment, SessionUser, TokenIssuer,
};
use gatehouse_server::{AppConfig, ServerBuilder};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Records every reset link instead of sending it.
#[derive(Default)]
struct CapturingMailer {
    links: Mutex<Vec<String>>,
}

impl CapturingMailer {
    fn last_token(&self) -> Option<String> {
        let links = self.links.lock().unwrap();
        let link = links.last()?;
        link.split_once("token=").map(|(_, t)| t.to_string())
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_password_reset(&self, _email: &str, link: &str) -> AuthResult<()> {
        self.links.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

fn config(environment: Environment) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.environment = environment;
    cfg.auth.signing.secret = SECRET.to_string();
    cfg.auth.rate_limiting.password_reset_short = RateLimitRule::new(60, 10);
    cfg
}

struct TestServer {
    base: String,
    mailer: Arc<CapturingMailer>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(cfg: AppConfig) -> Self {
        let mailer = Arc::new(CapturingMailer::default());
        let server = ServerBuilder::new()
            .with_config(cfg)
            .with_collaborators(Collaborators::in_memory().with_mailer(mailer.clone()))
            .build()
            .await
            .expect("build server");
        let app = server.router();

        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
        });

        Self {
            base: format!("http://{addr}"),
            mailer,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Minimal browser: keeps cookies by name and echoes the CSRF token.
struct Browser {
    http: reqwest::Client,
    base: String,
    cookies: Vec<(String, String)>,
    csrf: Option<String>,
}

impl Browser {
    fn new(server: &TestServer) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.base.clone(),
            cookies: Vec::new(),
            csrf: None,
        }
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn absorb(&mut self, headers: &HeaderMap) {
        for raw in set_cookies(headers) {
            let (pair, attrs) = raw.split_once(';').unwrap_or((raw.as_str(), ""));
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            self.cookies.retain(|(n, _)| n != name);
            if !attrs.contains("Max-Age=0") {
                self.cookies.push((name.to_string(), value.to_string()));
            }
        }
    }

    async fn send(
        &mut self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> reqwest::Response {
        let mut request = self.http.request(method, format!("{}{path}", self.base));
        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(COOKIE, header);
        }
        if let Some(token) = &self.csrf {
            request = request.header("x-csrf-token", token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("request");
        self.absorb(response.headers());
        response
    }

    async fn get(&mut self, path: &str) -> reqwest::Response {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&mut self, path: &str, body: Value) -> reqwest::Response {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn bootstrap_csrf(&mut self) {
        let response = self.get("/auth/csrf-token").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        self.csrf = body["csrfToken"].as_str().map(str::to_string);
        assert!(self.csrf.is_some());
    }

    async fn register(&mut self, email: &str, password: &str) {
        let response = self
            .post(
                "/auth/register",
                json!({ "email": email, "password": password, "name": "Ada" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn set_cookie_named<'a>(cookies: &'a [String], name: &str) -> Option<&'a String> {
    cookies.iter().find(|c| c.starts_with(&format!("{name}=")))
}

#[tokio::test]
async fn test_login_sets_cookies_and_hides_tokens() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);
    browser.bootstrap_csrf().await;
    browser.register("ada@example.com", "correct horse").await;

    let mut fresh = Browser::new(&server);
    fresh.bootstrap_csrf().await;
    let response = fresh
        .post(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(response.headers());
    assert_eq!(cookies.len(), 2);
    for name in ["accessToken", "refreshToken"] {
        let cookie = set_cookie_named(&cookies, name).expect("session cookie");
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }

    let issued: Vec<String> = ["accessToken", "refreshToken"]
        .iter()
        .map(|name| fresh.cookie(name).expect("stored cookie").to_string())
        .collect();
    assert!(issued[0].contains("eyJ"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ada@example.com");
    let text = body.to_string();
    assert!(!text.contains("accessToken"));
    assert!(!text.contains("refreshToken"));
    assert!(!text.contains("eyJ"));
    for value in &issued {
        assert!(!text.contains(value.as_str()));
        // Signed values are a padded base64 MAC, percent-encoded, then the token.
        let (_, raw) = value.rsplit_once("%3D").expect("signed cookie value");
        assert!(!raw.is_empty());
        assert!(!text.contains(raw));
    }

    let response = fresh.get("/auth/validate").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["valid"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_sixth_failed_login_is_rate_limited() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);

    for _ in 0..5 {
        let response = browser
            .post(
                "/auth/login",
                json!({ "email": "nobody@example.com", "password": "wrong" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("ratelimit-remaining"));
    }

    let response = browser
        .post(
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "wrong" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    // Health stays reachable.
    let response = browser.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_csrf_header_must_match_cookie() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);
    browser.bootstrap_csrf().await;
    browser.register("ada@example.com", "correct horse").await;

    let token = browser.csrf.clone();
    browser.csrf = Some("forged".to_string());
    let response = browser.post("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "CSRF token mismatch");

    browser.csrf = None;
    let response = browser.post("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    browser.csrf = token;
    let response = browser.post("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_logout_expires_cookies_and_revokes_refresh() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);
    browser.bootstrap_csrf().await;
    browser.register("ada@example.com", "correct horse").await;
    let refresh_cookie = browser.cookie("refreshToken").unwrap().to_string();

    let response = browser.post("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(response.headers());
    for name in ["accessToken", "refreshToken"] {
        let cookie = set_cookie_named(&cookies, name).expect("cleared cookie");
        assert!(cookie.contains("Max-Age=0"));
    }
    assert!(browser.cookie("accessToken").is_none());

    // Replaying the old refresh cookie fails.
    browser.cookies.push(("refreshToken".to_string(), refresh_cookie));
    let response = browser.post("/auth/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);
    browser.bootstrap_csrf().await;
    browser.register("ada@example.com", "correct horse").await;
    let first = browser.cookie("refreshToken").unwrap().to_string();

    let response = browser.post("/auth/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = browser.cookie("refreshToken").unwrap().to_string();
    assert_ne!(first, second);

    browser.cookies.retain(|(n, _)| n != "refreshToken");
    browser.cookies.push(("refreshToken".to_string(), first));
    let response = browser.post("/auth/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(response.headers());
    let cleared = set_cookie_named(&cookies, "refreshToken").expect("cleared cookie");
    assert!(cleared.contains("Max-Age=0"));

    server.stop().await;
}

#[tokio::test]
async fn test_password_reset_token_is_single_use() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);
    browser.bootstrap_csrf().await;
    browser.register("ada@example.com", "correct horse").await;

    let response = browser
        .post("/auth/forgot-password", json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = server.mailer.last_token().expect("reset link sent");

    // Unknown addresses look the same to the caller.
    let response = browser
        .post("/auth/forgot-password", json!({ "email": "ghost@example.com" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.mailer.links.lock().unwrap().len(), 1);

    let reset = json!({ "token": token, "newPassword": "battery staple" });
    let response = browser.post("/auth/reset-password", reset.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = browser.post("/auth/reset-password", reset).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The old session is gone; the new password works.
    let response = browser.post("/auth/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = browser
        .post(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "battery staple" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_expired_access_token_is_rejected() {
    let server = TestServer::start(config(Environment::Test)).await;
    let mut browser = Browser::new(&server);

    let user = SessionUser {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        role: "owner".to_string(),
        is_demo: false,
    };
    let issuer = TokenIssuer::new(SECRET.as_bytes(), "gatehouse", Duration::from_secs(900));
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let expired = issuer
        .encode(&AccessTokenClaims::builder("gatehouse", &user).expires_at(now - 60).build())
        .unwrap();
    let live = issuer
        .encode(&AccessTokenClaims::builder("gatehouse", &user).build())
        .unwrap();

    let response = browser
        .http
        .get(format!("{}/auth/validate", server.base))
        .bearer_auth(&expired)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));

    let response = browser
        .http
        .get(format!("{}/auth/validate", server.base))
        .bearer_auth(&live)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_production_cookies_are_strict_and_secure() {
    let server = TestServer::start(config(Environment::Production)).await;
    let mut browser = Browser::new(&server);

    let response = browser.get("/auth/csrf-token").await;
    let cookies = set_cookies(response.headers());
    let csrf = set_cookie_named(&cookies, "csrf-token").expect("csrf cookie");
    assert!(csrf.contains("Secure"));
    assert!(csrf.contains("SameSite=Strict"));
    assert!(!csrf.contains("HttpOnly"));

    let response = browser
        .post(
            "/auth/register",
            json!({ "email": "ada@example.com", "password": "correct horse", "name": "Ada" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = set_cookies(response.headers());
    for name in ["accessToken", "refreshToken"] {
        let cookie = set_cookie_named(&cookies, name).expect("session cookie");
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("HttpOnly"));
    }

    server.stop().await;
}
