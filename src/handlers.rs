use crate::{
    AppState,
    auth::AuthUser,
    cookies::{self, ACCESS_TOKEN_COOKIE, CODE_VERIFIER_COOKIE},
    error::AppError,
    models::{
        CreateSchoolRequest, CreateStudentRequest, DashboardStats, ForgotPasswordForm, ListQuery,
        Page, Pagination, School, SignInForm, Student, StudentQuery, UpdateSchoolRequest,
        UpdateStudentRequest, UpdateUserRequest, UserProfile, search_term,
    },
    paths::SIGN_IN_PATH,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// OAuth providers enabled on the identity provider project.
pub const OAUTH_PROVIDERS: &[&str] = &["google", "azure"];

const INVALID_CREDENTIALS_REDIRECT: &str = "/sign-in?error=invalid_credentials";
const CALLBACK_FAILED_REDIRECT: &str = "/sign-in?error=auth_callback";
const RECOVERY_SENT_REDIRECT: &str = "/forgot-password?sent=true";

/// CallbackQuery
///
/// Query string the identity provider appends when it sends the browser back.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Console path to land on after a successful exchange.
    pub next: Option<String>,
}

/// health
///
/// [Public Route] Liveness check for the load balancer.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

// --- Dashboard & Profile ---

/// get_dashboard
///
/// [Authenticated Route] Headline counters for the console home page.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard counters", body = DashboardStats))
)]
pub async fn get_dashboard(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.repo.get_stats().await?))
}

/// get_me
///
/// [Authenticated Route] The signed-in operator's own profile and roles.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 404, description = "No profile row for this identity")
    )
)]
pub async fn get_me(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("profile"))
}

// --- Schools ---

/// list_schools
///
/// [Admin Route] Paginated school listing with an optional name/code search.
#[utoipa::path(
    get,
    path = "/schools",
    params(ListQuery),
    responses((status = 200, description = "Schools", body = Page<School>))
)]
pub async fn list_schools(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<School>>, AppError> {
    let pagination = Pagination::new(query.page, query.per_page);
    let page = state
        .repo
        .list_schools(search_term(query.search.as_deref()), pagination)
        .await?;
    Ok(Json(page))
}

/// create_school
///
/// [Admin Route] Validates and stores a new school. Duplicate codes answer `409`.
#[utoipa::path(
    post,
    path = "/schools",
    request_body = CreateSchoolRequest,
    responses(
        (status = 201, description = "Created", body = School),
        (status = 409, description = "Code already used"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_school(
    State(state): State<AppState>,
    Json(payload): Json<CreateSchoolRequest>,
) -> Result<(StatusCode, Json<School>), AppError> {
    let payload = payload.validate()?;
    let school = state.repo.create_school(payload).await?;
    tracing::info!(school_id = %school.id, code = %school.code, "school created");
    Ok((StatusCode::CREATED, Json(school)))
}

/// get_school
///
/// [Admin Route] A single school by id.
#[utoipa::path(
    get,
    path = "/schools/{id}",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "Found", body = School),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<School>, AppError> {
    state
        .repo
        .get_school(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("school"))
}

/// update_school
///
/// [Admin Route] Partial update; absent fields are left untouched.
#[utoipa::path(
    put,
    path = "/schools/{id}",
    params(("id" = Uuid, Path, description = "School ID")),
    request_body = UpdateSchoolRequest,
    responses(
        (status = 200, description = "Updated", body = School),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSchoolRequest>,
) -> Result<Json<School>, AppError> {
    let payload = payload.validate()?;
    state
        .repo
        .update_school(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("school"))
}

/// delete_school
///
/// [Admin Route] Removes a school. Students cascade with it at the database level.
#[utoipa::path(
    delete,
    path = "/schools/{id}",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_school(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_school(id).await? {
        tracing::info!(school_id = %id, "school deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("school"))
    }
}

// --- Users ---

/// list_users
///
/// [Admin Route] Paginated operator/staff listing with roles.
#[utoipa::path(
    get,
    path = "/users",
    params(ListQuery),
    responses((status = 200, description = "Users", body = Page<UserProfile>))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<UserProfile>>, AppError> {
    let pagination = Pagination::new(query.page, query.per_page);
    let page = state
        .repo
        .list_users(search_term(query.search.as_deref()), pagination)
        .await?;
    Ok(Json(page))
}

/// get_user
///
/// [Admin Route] A single profile by id.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}

/// update_user
///
/// [Admin Route] Edits profile fields. Role memberships are not editable here.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let payload = payload.validate()?;
    state
        .repo
        .update_user(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}

// --- Students ---

/// list_students
///
/// [Admin Route] Paginated student listing, optionally restricted to one school.
#[utoipa::path(
    get,
    path = "/students",
    params(StudentQuery),
    responses((status = 200, description = "Students", body = Page<Student>))
)]
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentQuery>,
) -> Result<Json<Page<Student>>, AppError> {
    let pagination = Pagination::new(query.page, query.per_page);
    let page = state
        .repo
        .list_students(
            query.school_id,
            search_term(query.search.as_deref()),
            pagination,
        )
        .await?;
    Ok(Json(page))
}

/// create_student
///
/// [Admin Route] Enrolls a student in a school. Duplicate id numbers answer `409`.
#[utoipa::path(
    post,
    path = "/students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Created", body = Student),
        (status = 404, description = "Unknown school"),
        (status = 409, description = "Id number already used"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let payload = payload.validate()?;
    if state.repo.get_school(payload.school_id).await?.is_none() {
        return Err(AppError::NotFound("school"));
    }
    let student = state.repo.create_student(payload).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// get_student
#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Found", body = Student),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>, AppError> {
    state
        .repo
        .get_student(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("student"))
}

/// update_student
#[utoipa::path(
    put,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = UpdateStudentRequest,
    responses(
        (status = 200, description = "Updated", body = Student),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let payload = payload.validate()?;
    state
        .repo
        .update_student(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("student"))
}

/// delete_student
#[utoipa::path(
    delete,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_student(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("student"))
    }
}

// --- Authentication flows ---

/// sign_in
///
/// [Public Route] Email/password sign-in through the identity provider.
///
/// *Flow*: validate the form, ask the provider for a password grant, store the granted
/// session in cookies and send the browser to the default page. Refused credentials
/// go back to the sign-in page with an error flag.
#[utoipa::path(
    post,
    path = "/sign-in",
    request_body(content = SignInForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, or sent back with an error flag"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Form(form): Form<SignInForm>,
) -> Result<Response, AppError> {
    let form = form.validate()?;

    match state
        .identity
        .sign_in_with_password(&form.email, &form.password)
        .await?
    {
        Some(grant) => {
            tracing::info!(user_id = %grant.user.id, "operator signed in");
            let issued = cookies::session_cookies(&grant, state.config.secure_cookies());
            let response = Redirect::to(&state.config.routes.default_redirect).into_response();
            Ok(cookies::propagate(response, &issued))
        }
        None => {
            tracing::info!("sign-in refused by identity provider");
            Ok(Redirect::to(INVALID_CREDENTIALS_REDIRECT).into_response())
        }
    }
}

/// forgot_password
///
/// [Public Route] Sends a recovery email. The answer is the same whether or not the
/// address belongs to an account.
///
/// The emailed link returns through `/auth/callback` with a PKCE code, so the verifier
/// is remembered here exactly as `oauth_start` does.
#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body(content = ForgotPasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Recovery email requested"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let form = form.validate()?;
    let verifier = pkce_verifier();
    let redirect_to = format!(
        "{}/auth/callback?next={}",
        state.config.site_url.trim_end_matches('/'),
        state.config.routes.default_redirect
    );
    state
        .identity
        .send_password_recovery(&form.email, &redirect_to, &pkce_challenge(&verifier))
        .await?;

    let verifier_cookie = cookies::code_verifier_cookie(verifier, state.config.secure_cookies());
    Ok(cookies::propagate(
        Redirect::to(RECOVERY_SENT_REDIRECT).into_response(),
        &[verifier_cookie],
    ))
}

/// pkce_verifier
///
/// 32 random bytes, base64url without padding (43 characters).
pub fn pkce_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge for `verifier`.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// oauth_start
///
/// [Public Route] Starts an OAuth sign-in: remembers a PKCE verifier in a short-lived
/// cookie and sends the browser to the provider with the matching challenge.
#[utoipa::path(
    get,
    path = "/auth/oauth/{provider}",
    params(("provider" = String, Path, description = "OAuth provider, e.g. google")),
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 404, description = "Provider not enabled")
    )
)]
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Response, AppError> {
    if !OAUTH_PROVIDERS.contains(&provider.as_str()) {
        return Err(AppError::NotFound("oauth provider"));
    }

    let verifier = pkce_verifier();
    let challenge = pkce_challenge(&verifier);
    let redirect_to = format!("{}/auth/callback", state.config.site_url.trim_end_matches('/'));
    let url = state
        .identity
        .authorize_url(&provider, &redirect_to, &challenge);

    let verifier_cookie = cookies::code_verifier_cookie(verifier, state.config.secure_cookies());
    Ok(cookies::propagate(
        Redirect::to(&url).into_response(),
        &[verifier_cookie],
    ))
}

/// Only same-site absolute paths are accepted as post-login targets.
pub fn safe_next(next: Option<&str>, fallback: &str) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => fallback.to_string(),
    }
}

/// auth_callback
///
/// [Public Route] Finishes an OAuth or recovery flow by exchanging the provider's code
/// for a session. The verifier cookie is cleared whatever the outcome.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses((status = 303, description = "Signed in, or sent back to sign-in"))
)]
pub async fn auth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let secure = state.config.secure_cookies();
    let clear_verifier = cookies::expired(CODE_VERIFIER_COOKIE, secure);
    let verifier = jar.get(CODE_VERIFIER_COOKIE).map(|c| c.value().to_string());

    let (Some(code), Some(verifier)) = (query.code, verifier) else {
        tracing::info!("auth callback without code or verifier");
        return Ok(cookies::propagate(
            Redirect::to(CALLBACK_FAILED_REDIRECT).into_response(),
            &[clear_verifier],
        ));
    };

    match state
        .identity
        .exchange_code_for_session(&code, &verifier)
        .await?
    {
        Some(grant) => {
            tracing::info!(user_id = %grant.user.id, "operator signed in via callback");
            let mut issued = cookies::session_cookies(&grant, secure);
            issued.push(clear_verifier);
            let target = safe_next(
                query.next.as_deref(),
                &state.config.routes.default_redirect,
            );
            Ok(cookies::propagate(
                Redirect::to(&target).into_response(),
                &issued,
            ))
        }
        None => Ok(cookies::propagate(
            Redirect::to(CALLBACK_FAILED_REDIRECT).into_response(),
            &[clear_verifier],
        )),
    }
}

/// sign_out
///
/// [Authenticated Route] Revokes the session at the provider (best effort), clears the
/// session cookies and returns to the sign-in page.
#[utoipa::path(
    post,
    path = "/sign-out",
    responses((status = 303, description = "Signed out"))
)]
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = jar.get(ACCESS_TOKEN_COOKIE) {
        // The cookies go either way; a failed revoke only leaves a token to expire on its own.
        if let Err(e) = state.identity.sign_out(token.value()).await {
            tracing::warn!(error = %e, "provider sign-out failed");
        }
    }
    cookies::propagate(
        Redirect::to(SIGN_IN_PATH).into_response(),
        &cookies::cleared_session_cookies(state.config.secure_cookies()),
    )
}
