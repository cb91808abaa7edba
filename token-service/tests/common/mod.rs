#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use auth::Authenticator;
use auth::HashingCost;
use auth::PasswordHasher;
use chrono::Duration;
use serde_json::json;
use serde_json::Value;
use token_service::domain::credentials::service::AuthService;
use token_service::domain::credentials::service::TokenPolicy;
use token_service::inbound::http::router::create_router;
use token_service::outbound::notifier::LogNotifier;
use token_service::outbound::repositories::InMemoryCredentialStore;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

pub fn fast_cost() -> HashingCost {
    HashingCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Test application that spawns a real server
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryCredentialStore>,
    pub api_client: reqwest::Client,
    pub authenticator: Authenticator,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let store = Arc::new(InMemoryCredentialStore::new());
        let policy = TokenPolicy::new(
            JWT_SECRET.to_vec(),
            Duration::minutes(15),
            Duration::days(30),
        )
        .expect("Invalid test policy")
        .with_hashing_cost(fast_cost());
        let auth_service =
            AuthService::new(Arc::clone(&store), Arc::new(LogNotifier::new()), policy)
                .expect("Failed to build auth service");

        let router = create_router(
            Arc::new(auth_service),
            &["http://localhost:5173".to_string()],
        );

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        let authenticator = Authenticator::with_hasher(
            JWT_SECRET,
            PasswordHasher::with_cost(fast_cost()).expect("Invalid hashing cost"),
        )
        .expect("Failed to create authenticator");

        Self {
            address,
            port,
            store,
            api_client: reqwest::Client::new(),
            authenticator,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Register a user and return the response body
    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.post("/api/register")
            .json(&json!({
                "username": username,
                "email": email,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log in, optionally from a forwarded client address
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        forwarded_for: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.post("/api/login").json(&json!({
            "email": email,
            "password": password
        }));
        if let Some(ip) = forwarded_for {
            request = request.header("X-Forwarded-For", ip);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Exchange a token pair, optionally from a forwarded client address
    pub async fn refresh(
        &self,
        tokens: &TokenPair,
        forwarded_for: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.post("/api/refresh").json(&json!({
            "access_token": tokens.access_token,
            "refresh_token": tokens.refresh_token
        }));
        if let Some(ip) = forwarded_for {
            request = request.header("X-Forwarded-For", ip);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Register `alice` and log her in from loopback
    pub async fn registered_tokens(&self) -> TokenPair {
        let response = self.register("alice", "alice@example.com", "pass_word!").await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let response = self.login("alice@example.com", "pass_word!", None).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        TokenPair::from_body(&response.json().await.expect("Failed to parse response"))
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn from_body(body: &Value) -> Self {
        Self {
            access_token: body["data"]["access_token"]
                .as_str()
                .expect("missing access_token")
                .to_string(),
            refresh_token: body["data"]["refresh_token"]
                .as_str()
                .expect("missing refresh_token")
                .to_string(),
        }
    }
}
