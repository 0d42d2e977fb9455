use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// The console's CRUD screens. Every path here is in the route table's protected list,
/// so the gate only lets super admins through; everyone else is redirected to
/// `/forbidden` (or `/sign-in` when anonymous).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Schools ---
        .route(
            "/schools",
            get(handlers::list_schools).post(handlers::create_school),
        )
        .route(
            "/schools/{id}",
            get(handlers::get_school)
                .put(handlers::update_school)
                .delete(handlers::delete_school),
        )
        // --- Users ---
        .route("/users", get(handlers::list_users))
        .route(
            "/users/{id}",
            get(handlers::get_user).put(handlers::update_user),
        )
        // --- Students ---
        .route(
            "/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/students/{id}",
            get(handlers::get_student)
                .put(handlers::update_student)
                .delete(handlers::delete_student),
        )
}
