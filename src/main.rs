use yeko_admin::{
    AppState, IdentityState, PostgresRepository, RepositoryState, RoleChecker, RoleState,
    SessionState, SupabaseAuthClient, SupabaseSessionResolver,
    config::{AppConfig, Env},
    create_router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, connects to the hosted database and identity
/// provider, and serves the console.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the development default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yeko_admin=debug,tower_http=info,axum=info".into());

    // Pretty output locally, JSON for the log aggregator in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Yeko Admin starting in {:?} mode", config.env);

    // 3. Hosted Postgres. The same repository answers data queries and role lookups.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = Arc::new(PostgresRepository::new(pool));
    let repo = postgres.clone() as RepositoryState;
    let roles = RoleChecker::new(postgres as RoleState);

    // 4. Identity provider and the session resolver built on it.
    let identity = Arc::new(SupabaseAuthClient::new(
        &config.supabase_url,
        &config.supabase_anon_key,
    )) as IdentityState;
    let sessions = Arc::new(SupabaseSessionResolver::new(
        identity.clone(),
        &config.jwt_secret,
        config.secure_cookies(),
    )) as SessionState;

    tracing::debug!(routes = ?config.routes, "route table loaded");

    let bind_address = config.bind_address.clone();
    let app_state = AppState {
        repo,
        identity,
        sessions,
        roles,
        config,
    };

    // 5. Router and server.
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .expect("FATAL: Failed to bind BIND_ADDRESS.");

    tracing::info!("Listening on {}", bind_address);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
