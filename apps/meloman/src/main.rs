use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meloman::config::Config;
use meloman::services::AuthService;
use meloman::{db, AppState};

fn init_tracing() {
    // RUST_LOG overrides; default is debug for our crate, info for axum,
    // warn for everything else
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("meloman=debug,tower_http=debug,axum=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn ensure_dir(path: &std::path::Path, what: &str) {
    if path.as_os_str().is_empty() || path.exists() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(path) {
        tracing::error!("Failed to create {} directory {:?}: {}", what, path, e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    tracing::info!("Starting Meloman v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match Config::load() {
        Ok(cfg) => {
            tracing::info!("Configuration loaded successfully");
            tracing::debug!("Server: {}:{}", cfg.server.host, cfg.server.port);
            tracing::debug!("Database: {:?}", cfg.database.path);
            tracing::debug!("Uploads: {:?}", cfg.uploads.dir);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(parent) = config.database.path.parent() {
        ensure_dir(parent, "database");
    }
    ensure_dir(&config.uploads.dir, "uploads");

    let conn = match db::init_db(&config.database.path) {
        Ok(conn) => {
            tracing::info!("Database initialized at {:?}", config.database.path);
            conn
        }
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let session_secret = config.server.session_secret.clone().unwrap_or_else(|| {
        tracing::warn!("No session secret configured, using a random one");
        tracing::warn!("Set MELOMAN_SERVER__SESSION_SECRET for production use");
        random_secret()
    });
    config.server.session_secret = Some(session_secret.clone());

    let addr = config.server_addr();
    let state = AppState::new(config, conn, AuthService::new(session_secret));
    let app = meloman::router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Meloman listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
