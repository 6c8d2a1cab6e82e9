//! Common test utilities for E2E tests

#![allow(dead_code)]

use kvblog::auth::Identity;
use kvblog::AppState;
use kvblog::config::{AppConfig, StoreBackend, StoreConfig};
use kvblog::store::WriteMode;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server on a SQLite store
    pub async fn new() -> Self {
        Self::with_blog(10, 50).await
    }

    /// Create a test server with custom page sizes
    pub async fn with_blog(posts_per_page: u64, followers_per_page: u64) -> Self {
        // Create temporary directory for the store file
        let temp_dir = TempDir::new().unwrap();

        let mut config = AppConfig::in_memory();
        config.store = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: temp_dir.path().join("test.db"),
            write_mode: WriteMode::Atomic,
        };
        config.blog.posts_per_page = posts_per_page;
        config.blog.followers_per_page = followers_per_page;
        config.blog.admin_email = Some("admin@example.com".to_string());

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = kvblog::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user and return the identity the presentation layer would build
    pub async fn register(&self, name: &str) -> Identity {
        let id = self
            .state
            .accounts
            .register(name, "test-hash", &format!("{name}@example.com"))
            .await
            .unwrap();
        let user = self
            .state
            .accounts
            .find_by_email(&format!("{name}@example.com"))
            .await
            .unwrap();
        assert_eq!(user.id, id);
        Identity::for_user(&user)
    }

    /// Publish a post as `author`
    pub async fn publish(&self, author: &Identity, title: &str) -> u64 {
        self.state
            .posts
            .publish(author, title, &format!("<p>{title}</p>"), "misc")
            .await
            .unwrap()
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json(&self, path: &str) -> (u16, serde_json::Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap();
        (status, body)
    }
}
