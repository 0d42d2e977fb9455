use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::AuthUser,
    cookies,
    error::AppError,
    policy::{self, Decision},
    session::SessionIdentity,
};

/// gate
///
/// Runs once per request before any handler:
///
/// 1. resolve the session from the request cookies (may refresh it)
/// 2. classify the path and run the redirect policy
/// 3. build the pass-through or redirect response
/// 4. copy every cookie issued in step 1 onto that response
///
/// Identity-provider failures in step 1 are returned as `AppError::Session` and become
/// the request's response; they are not retried or downgraded to "anonymous".
pub async fn gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_owned();
    let jar = CookieJar::from_headers(request.headers());

    let resolution = state.sessions.resolve(&jar).await?;
    let decision = policy::evaluate(
        &state.config.routes,
        &path,
        &resolution.identity,
        &state.roles,
    )
    .await;

    tracing::debug!(path = %path, identity = ?resolution.identity, decision = ?decision, "request gate");

    let response = match decision {
        Decision::Continue => {
            if let SessionIdentity::User(id) = resolution.identity {
                request.extensions_mut().insert(AuthUser { id });
            }
            cookies::carry_into_request(&mut request, &resolution.cookies);
            next.run(request).await
        }
        Decision::RedirectTo(target) => Redirect::temporary(&target).into_response(),
    };

    Ok(cookies::propagate(response, &resolution.cookies))
}
