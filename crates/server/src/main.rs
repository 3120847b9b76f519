mod error;
mod rate_limit;
mod routes;
mod storage;

use axum::{
    extract::FromRef,
    routing::{delete, get, patch, post},
    Router,
};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rate_limit::RateLimiter;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub limiter: RateLimiter,
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.limiter.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coldcall_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("COLDCALL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize database (schema, migrations, bootstrap admin)
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
    let jwt_secret = if jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set — using a development default; set it in production");
        "dev-secret-change-in-production".to_string()
    } else {
        jwt_secret
    };

    let state = AppState {
        db,
        config: AppConfig { jwt_secret },
        limiter: RateLimiter::new(),
    };

    // Build API routes
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth & session
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/session", get(routes::auth::session))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        // Users
        .route("/users", get(routes::users::list_users))
        .route("/users", post(routes::users::create_user))
        .route(
            "/users/{id}",
            patch(routes::users::update_user).delete(routes::users::delete_user),
        )
        .route(
            "/users/{id}/deactivate",
            post(routes::users::deactivate_user),
        )
        .route("/users/transfer", post(routes::users::transfer_practices))
        // Practices
        .route("/practices", get(routes::practices::list_practices))
        .route("/practices", post(routes::practices::create_practice))
        .route("/practices/{id}", patch(routes::practices::update_practice))
        .route(
            "/practices/bulk-assign",
            post(routes::practices::bulk_assign),
        )
        .route("/practices/regions", get(routes::practices::regions))
        .route("/practices/locations", get(routes::practices::locations))
        // Calls
        .route("/calls", get(routes::calls::list_calls))
        .route("/calls", post(routes::calls::log_call))
        .route(
            "/calls/{id}",
            patch(routes::calls::update_call).delete(routes::calls::delete_call),
        )
        // Assignments
        .route("/assignments", get(routes::assignments::list_assignments))
        .route(
            "/assignments",
            delete(routes::assignments::delete_assignments),
        )
        .route(
            "/assignments/generate",
            post(routes::assignments::generate_schedule),
        )
        // Campaigns (derived)
        .route("/campaigns", get(routes::campaigns::list_campaigns))
        .route("/campaigns", delete(routes::campaigns::delete_campaign))
        // Stats
        .route("/stats/outcomes", get(routes::stats::outcomes))
        .route("/stats/regions", get(routes::stats::regions))
        .route("/stats/dashboard", get(routes::stats::dashboard))
        .route("/stats/planner", get(routes::stats::planner))
        // Admin maintenance
        .route("/admin/backup", post(routes::admin::backup))
        .route("/admin/data", delete(routes::admin::purge_data));

    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    tracing::info!("starting server on port {port}");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
