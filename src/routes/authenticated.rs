use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any signed-in operator. The gate sends anonymous visitors to `/sign-in`
/// before these run, and attaches the `AuthUser` the handlers extract.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        // Headline counters; the default landing page after sign-in.
        .route("/dashboard", get(handlers::get_dashboard))
        // GET /me
        .route("/me", get(handlers::get_me))
        // POST /sign-out
        // Revokes the session and clears the session cookies.
        .route("/sign-out", post(handlers::sign_out))
}
