use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::{AppState, paths::RouteConfig};

pub const SITE_NAME: &str = "Yeko Admin";
const SITE_DESCRIPTION: &str =
    "Administration console for Yeko, the school management platform: schools, staff and students in one place.";

/// Public pages listed in the sitemap, with their change frequency and priority.
const SITEMAP_PAGES: &[(&str, &str, &str)] = &[
    ("/", "weekly", "1.0"),
    ("/sign-in", "monthly", "0.5"),
    ("/forgot-password", "yearly", "0.3"),
];

/// PageMeta
///
/// Title and description a renderer puts in `<title>`, `<meta>` and Open Graph tags.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub og_image: String,
}

/// LandingPage
///
/// Marketing landing page data, including its schema.org JSON-LD block.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LandingPage {
    pub meta: PageMeta,
    #[schema(value_type = Object)]
    pub structured_data: Value,
}

fn page_meta(site_url: &str, path: &str, title: &str, description: &str) -> PageMeta {
    let origin = site_url.trim_end_matches('/');
    PageMeta {
        title: format!("{title} | {SITE_NAME}"),
        description: description.to_string(),
        canonical_url: format!("{origin}{path}"),
        og_image: format!("{origin}/og-image.png"),
    }
}

/// JSON-LD describing the console as a web application offered by its organization.
pub fn structured_data(site_url: &str) -> Value {
    let origin = site_url.trim_end_matches('/');
    json!({
        "@context": "https://schema.org",
        "@graph": [
            {
                "@type": "Organization",
                "name": "Yeko",
                "url": origin,
                "logo": format!("{origin}/logo.png"),
            },
            {
                "@type": "WebApplication",
                "name": SITE_NAME,
                "url": origin,
                "applicationCategory": "EducationalApplication",
                "operatingSystem": "Web",
                "description": SITE_DESCRIPTION,
            }
        ]
    })
}

/// landing
///
/// [Public Route] `GET /`.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page data", body = LandingPage))
)]
pub async fn landing(State(state): State<AppState>) -> Json<LandingPage> {
    let site_url = &state.config.site_url;
    Json(LandingPage {
        meta: page_meta(site_url, "/", "School management, simplified", SITE_DESCRIPTION),
        structured_data: structured_data(site_url),
    })
}

/// sign_in_page
///
/// [Public Route] Metadata for the sign-in page.
#[utoipa::path(
    get,
    path = "/sign-in",
    responses((status = 200, description = "Sign-in page metadata", body = PageMeta))
)]
pub async fn sign_in_page(State(state): State<AppState>) -> Json<PageMeta> {
    Json(page_meta(
        &state.config.site_url,
        "/sign-in",
        "Sign in",
        "Sign in to the Yeko administration console.",
    ))
}

#[utoipa::path(
    get,
    path = "/forgot-password",
    responses((status = 200, description = "Recovery page metadata", body = PageMeta))
)]
pub async fn forgot_password_page(State(state): State<AppState>) -> Json<PageMeta> {
    Json(page_meta(
        &state.config.site_url,
        "/forgot-password",
        "Forgot password",
        "Receive a link to reset your Yeko console password.",
    ))
}

/// forbidden_page
///
/// [Public Route] Where signed-in operators without the admin role are sent.
#[utoipa::path(
    get,
    path = "/forbidden",
    responses((status = 403, description = "Access denied page metadata", body = PageMeta))
)]
pub async fn forbidden_page(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::FORBIDDEN,
        Json(page_meta(
            &state.config.site_url,
            "/forbidden",
            "Access denied",
            "Your account does not have access to this part of the console.",
        )),
    )
}

/// robots_txt
///
/// Lets crawlers see the public pages only, and points them at the sitemap.
pub fn robots_txt(site_url: &str, routes: &RouteConfig) -> String {
    let mut out = String::from("User-agent: *\nAllow: /\n");
    let mut disallowed: Vec<&str> = routes
        .auth_required_paths
        .iter()
        .chain(routes.protected_paths.iter())
        .map(String::as_str)
        .collect();
    disallowed.sort_unstable();
    disallowed.dedup();
    for path in disallowed {
        out.push_str(&format!("Disallow: {path}\n"));
    }
    out.push_str(&format!(
        "\nSitemap: {}/sitemap.xml\n",
        site_url.trim_end_matches('/')
    ));
    out
}

/// sitemap_xml
///
/// Sitemap protocol 0.9 document of the public pages.
pub fn sitemap_xml(site_url: &str) -> String {
    let origin = site_url.trim_end_matches('/');
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for (path, changefreq, priority) in SITEMAP_PAGES {
        out.push_str(&format!(
            "  <url>\n    <loc>{origin}{path}</loc>\n    <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n"
        ));
    }
    out.push_str("</urlset>\n");
    out
}

pub fn manifest() -> Value {
    json!({
        "name": SITE_NAME,
        "short_name": "Yeko",
        "description": SITE_DESCRIPTION,
        "start_url": "/dashboard",
        "display": "standalone",
        "background_color": "#ffffff",
        "theme_color": "#0f766e",
        "icons": [
            { "src": "/icon-192.png", "sizes": "192x192", "type": "image/png" },
            { "src": "/icon-512.png", "sizes": "512x512", "type": "image/png" }
        ]
    })
}

#[utoipa::path(
    get,
    path = "/robots.txt",
    responses((status = 200, description = "Crawler rules", body = String, content_type = "text/plain"))
)]
pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(&state.config.site_url, &state.config.routes),
    )
}

#[utoipa::path(
    get,
    path = "/sitemap.xml",
    responses((status = 200, description = "Sitemap of the public pages", body = String, content_type = "application/xml"))
)]
pub async fn sitemap(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        sitemap_xml(&state.config.site_url),
    )
}

#[utoipa::path(
    get,
    path = "/manifest.webmanifest",
    responses((status = 200, description = "Web app manifest", body = Object, content_type = "application/manifest+json"))
)]
pub async fn web_manifest() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        Json(manifest()),
    )
}
