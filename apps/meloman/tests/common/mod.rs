//! Test infrastructure for Meloman integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` with helper methods
//! for creating users, issuing session cookies and seeding the database.

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use meloman::config::{Config, ServerConfig, UploadsConfig};
use meloman::db::{self, queries};
use meloman::services::AuthService;
use meloman::AppState;

pub const TEST_SECRET: &str = "test-session-secret-for-integration-tests";

/// Test application wrapper around axum_test::TestServer.
pub struct TestApp {
    server: TestServer,
    db: Arc<Mutex<Connection>>,
    auth_service: Arc<AuthService>,
    uploads: TempDir,
}

impl TestApp {
    /// Create a new test application with in-memory database.
    ///
    /// Uses the production router, a test session secret and a temporary
    /// uploads directory that is removed when the app is dropped.
    pub async fn new() -> Self {
        let conn = db::init_db_memory().expect("Failed to initialize test database");
        let uploads = TempDir::new().expect("Failed to create uploads dir");

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                session_secret: Some(TEST_SECRET.to_string()),
                secure_cookies: false,
            },
            database: meloman::config::DatabaseConfig {
                path: ":memory:".into(),
            },
            uploads: UploadsConfig {
                dir: uploads.path().to_path_buf(),
                max_cover_bytes: 64 * 1024,
            },
            catalog: Default::default(),
        };

        let state = AppState::new(config, conn, AuthService::new(TEST_SECRET.to_string()));
        let db = Arc::clone(&state.db);
        let auth_service = Arc::clone(&state.auth_service);

        let server = TestServer::new(meloman::router(state)).expect("Failed to create test server");

        Self {
            server,
            db,
            auth_service,
            uploads,
        }
    }

    pub fn server(&self) -> &TestServer {
        &self.server
    }

    /// Useful for seeding test data or verifying database state.
    #[allow(dead_code)]
    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    #[allow(dead_code)]
    pub fn uploads_dir(&self) -> &Path {
        self.uploads.path()
    }

    /// Create a test user in the database. Returns the user id.
    pub async fn create_test_user(&self, email: &str, password: &str) -> i64 {
        let password_hash = self
            .auth_service
            .hash_password(password)
            .expect("Failed to hash password");

        let db = self.db.lock().await;
        match queries::insert_user(&db, email, &password_hash).expect("Failed to create test user") {
            queries::Insert::Created(id) => id,
            queries::Insert::Duplicate => panic!("user {} already exists", email),
        }
    }

    /// Session cookie header for the given user.
    pub fn session_header(&self, user_id: i64, email: &str) -> (HeaderName, HeaderValue) {
        let token = self
            .auth_service
            .create_token(user_id, email)
            .expect("Failed to create token");
        (
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", token)).expect("Invalid token format"),
        )
    }

    /// Create a user and return their id and session cookie header.
    pub async fn login(&self, email: &str) -> (i64, (HeaderName, HeaderValue)) {
        let user_id = self.create_test_user(email, "password123").await;
        let cookie = self.session_header(user_id, email);
        (user_id, cookie)
    }

    #[allow(dead_code)]
    pub async fn seed_catalog(&self, songs: &[(&str, &str)]) -> Vec<i64> {
        let db = self.db.lock().await;
        songs
            .iter()
            .map(|(title, artist)| {
                let entry = queries::NewCatalogEntry {
                    title: title.to_string(),
                    artist: artist.to_string(),
                    ..Default::default()
                };
                match queries::insert_catalog_entry(&db, &entry).expect("Failed to seed catalog") {
                    queries::Insert::Created(id) => id,
                    queries::Insert::Duplicate => panic!("duplicate catalog entry {}", title),
                }
            })
            .collect()
    }

    #[allow(dead_code)]
    pub async fn add_track(&self, user_id: i64, title: &str, artist: &str) -> i64 {
        let db = self.db.lock().await;
        match queries::insert_track(&db, user_id, title, artist).expect("Failed to add track") {
            queries::Insert::Created(id) => id,
            queries::Insert::Duplicate => panic!("duplicate track {}", title),
        }
    }

    #[allow(dead_code)]
    pub async fn track_titles(&self, user_id: i64) -> Vec<String> {
        let db = self.db.lock().await;
        queries::list_tracks(&db, user_id, None)
            .expect("Failed to list tracks")
            .into_iter()
            .map(|t| t.title)
            .collect()
    }
}

/// `Location` header of a redirect response.
#[allow(dead_code)]
pub fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .expect("Location is not ASCII")
        .to_string()
}

/// Decoded `level:message` value of the flash cookie set by a response.
#[allow(dead_code)]
pub fn flash(response: &TestResponse) -> Option<String> {
    let raw = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let value = cookie.strip_prefix("flash=")?;
            let value = value.split(';').next().unwrap_or_default();
            (!value.is_empty()).then(|| value.to_string())
        })?;

    // The message is url-encoded, and the cookie value may be encoded again
    let mut value = raw;
    for _ in 0..2 {
        if let Ok(decoded) = urlencoding::decode(&value) {
            value = decoded.into_owned();
        }
    }
    Some(value)
}

/// Value of the session cookie set by a response, if any.
#[allow(dead_code)]
pub fn session_cookie(response: &TestResponse) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let value = cookie.strip_prefix("session=")?;
            Some(value.split(';').next().unwrap_or_default().to_string())
        })
}
