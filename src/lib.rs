use axum::{Router, extract::FromRef, http::HeaderName, middleware::from_fn_with_state};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request gate: route table, session resolution, role check, decision table, cookies.
pub mod paths;
pub mod session;
pub mod roles;
pub mod policy;
pub mod cookies;
pub mod middleware;

// Identity provider client and access-token handling.
pub mod identity;
pub mod auth;

// Console data and pages.
pub mod handlers;
pub mod models;
pub mod repository;
pub mod seo;

pub mod config;
pub mod error;

pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use identity::{IdentityState, SupabaseAuthClient};
pub use repository::{PostgresRepository, RepositoryState};
pub use roles::{RoleChecker, RoleState};
pub use session::{SessionState, SupabaseSessionResolver};

/// ApiDoc
///
/// OpenAPI document for the console's JSON endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::get_dashboard, handlers::get_me,
        handlers::list_schools, handlers::create_school, handlers::get_school,
        handlers::update_school, handlers::delete_school,
        handlers::list_users, handlers::get_user, handlers::update_user,
        handlers::list_students, handlers::create_student, handlers::get_student,
        handlers::update_student, handlers::delete_student,
        handlers::sign_in, handlers::forgot_password, handlers::oauth_start,
        handlers::auth_callback, handlers::sign_out,
        seo::landing, seo::sign_in_page, seo::forgot_password_page, seo::forbidden_page,
        seo::robots, seo::sitemap, seo::web_manifest,
    ),
    components(
        schemas(
            models::School, models::CreateSchoolRequest, models::UpdateSchoolRequest,
            models::UserProfile, models::UpdateUserRequest,
            models::Student, models::CreateStudentRequest, models::UpdateStudentRequest,
            models::DashboardStats, models::SignInForm, models::ForgotPasswordForm,
            seo::PageMeta, seo::LandingPage,
        )
    ),
    tags(
        (name = "yeko-admin", description = "Yeko school management administration console")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of every service the console needs. Cloned per
/// request by axum; everything inside is an `Arc` or immutable configuration.
#[derive(Clone)]
pub struct AppState {
    /// Hosted database access.
    pub repo: RepositoryState,
    /// Hosted identity provider (sign-in, refresh, recovery, sign-out).
    pub identity: IdentityState,
    /// Turns request cookies into a session identity for the gate.
    pub sessions: SessionState,
    /// Live super-admin lookups for the gate.
    pub roles: RoleChecker,
    /// The loaded, immutable configuration, including the route table.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route under the request gate, then wraps the whole thing in the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // Same-origin console: no cross-origin callers are expected.
    let cors = CorsLayer::new();

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        // The gate wraps every route, fallback included, so unmatched paths are
        // classified like any other.
        .layer(from_fn_with_state(state.clone(), middleware::gate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request carrying method, URI and the `x-request-id` set above, so
/// every log line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
