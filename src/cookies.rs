use axum::{
    extract::Request,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::identity::TokenGrant;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

// Refresh tokens outlive any single access token; the provider revokes them server side.
const REFRESH_TOKEN_MAX_AGE_DAYS: i64 = 400;
// Long enough for a recovery email round trip; the provider's links expire after an hour.
const CODE_VERIFIER_MAX_AGE_MINUTES: i64 = 60;

fn base(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// The two cookies that carry a freshly granted session.
pub fn session_cookies(grant: &TokenGrant, secure: bool) -> Vec<Cookie<'static>> {
    let mut access = base(ACCESS_TOKEN_COOKIE, grant.access_token.clone(), secure);
    access.set_max_age(Duration::seconds(grant.expires_in.max(0)));

    let mut refresh = base(REFRESH_TOKEN_COOKIE, grant.refresh_token.clone(), secure);
    refresh.set_max_age(Duration::days(REFRESH_TOKEN_MAX_AGE_DAYS));

    vec![access, refresh]
}

/// Expired, empty versions of the session cookies. Browsers drop them on receipt.
pub fn cleared_session_cookies(secure: bool) -> Vec<Cookie<'static>> {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
        .into_iter()
        .map(|name| expired(name, secure))
        .collect()
}

pub fn code_verifier_cookie(verifier: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(CODE_VERIFIER_COOKIE, verifier, secure);
    cookie.set_max_age(Duration::minutes(CODE_VERIFIER_MAX_AGE_MINUTES));
    cookie
}

pub fn expired(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base(name, String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.max_age() == Some(Duration::ZERO)
}

/// Names of the cookies a response already sets.
fn names_set_by(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('='))
        .map(|(name, _)| name.trim().to_string())
        .collect()
}

/// propagate
///
/// Appends every cookie as its own `Set-Cookie` header on `response`, keeping name,
/// value and attributes. Works the same for redirects and pass-through responses, so a
/// session refreshed on a redirected request still reaches the browser.
///
/// A cookie the response already sets wins over a propagated one of the same name:
/// the handler ran later (sign-out clearing a session that was refreshed on the way in).
pub fn propagate(response: Response, cookies: &[Cookie<'static>]) -> Response {
    if cookies.is_empty() {
        return response;
    }
    let already_set = names_set_by(&response);
    let jar = cookies
        .iter()
        .filter(|cookie| !already_set.iter().any(|name| name == cookie.name()))
        .cloned()
        .fold(CookieJar::new(), |jar, cookie| jar.add(cookie));
    (jar, response).into_response()
}

/// carry_into_request
///
/// Rewrites the forwarded request's `Cookie` header so downstream handlers see the
/// cookies the session resolver just issued instead of the stale ones the browser sent.
pub fn carry_into_request(request: &mut Request, cookies: &[Cookie<'static>]) {
    if cookies.is_empty() {
        return;
    }

    let mut jar = CookieJar::from_headers(request.headers());
    for cookie in cookies {
        jar = if is_removal(cookie) {
            jar.remove(Cookie::new(cookie.name().to_string(), ""))
        } else {
            jar.add(Cookie::new(cookie.name().to_string(), cookie.value().to_string()))
        };
    }

    let header_value = jar
        .iter()
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect::<Vec<_>>()
        .join("; ");

    let headers = request.headers_mut();
    headers.remove(header::COOKIE);
    if header_value.is_empty() {
        return;
    }
    match HeaderValue::from_str(&header_value) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "could not rebuild forwarded cookie header"),
    }
}
