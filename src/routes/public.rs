use crate::{AppState, handlers, seo};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Signed-in operators are bounced off the
/// sign-in and recovery pages by the gate before these handlers run.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(handlers::health))
        // GET /
        // Landing page data with metadata and JSON-LD.
        .route("/", get(seo::landing))
        // SEO artifacts.
        .route("/robots.txt", get(seo::robots))
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/manifest.webmanifest", get(seo::web_manifest))
        // GET/POST /sign-in
        // Page data, then the email/password form submission.
        .route(
            "/sign-in",
            get(seo::sign_in_page).post(handlers::sign_in),
        )
        // GET/POST /forgot-password
        .route(
            "/forgot-password",
            get(seo::forgot_password_page).post(handlers::forgot_password),
        )
        // GET /auth/oauth/{provider}
        // Starts an OAuth sign-in with PKCE.
        .route("/auth/oauth/{provider}", get(handlers::oauth_start))
        // GET /auth/callback
        // Exchanges the provider's code for a session.
        .route("/auth/callback", get(handlers::auth_callback))
        // GET /forbidden
        // Where operators without the admin role land.
        .route("/forbidden", get(seo::forbidden_page))
}
