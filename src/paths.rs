use serde::{Deserialize, Serialize};

/// Where anonymous visitors are sent when a page requires a session.
pub const SIGN_IN_PATH: &str = "/sign-in";

/// Where signed-in operators without the admin role are sent.
pub const FORBIDDEN_PATH: &str = "/forbidden";

/// RouteConfig
///
/// The console's route table: four ordered lists of literal path prefixes plus the
/// landing page for signed-in operators. Built once at startup and shared read-only
/// by every request through `AppConfig`.
///
/// Matching is plain `starts_with` on the raw request path. `/schoolsabc` is matched
/// by `/schools` exactly like `/schools/abc` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Pages anyone may see. Informational: the gate never denies an unmatched path.
    pub public_paths: Vec<String>,
    /// Admin-only pages. Require a session AND the super-admin role.
    pub protected_paths: Vec<String>,
    /// Pages that require a session.
    pub auth_required_paths: Vec<String>,
    /// Sign-in style pages that signed-in operators should never see again.
    pub auth_pages: Vec<String>,
    /// Where signed-in operators land when they hit an auth page.
    pub default_redirect: String,
}

/// RouteConfigOverride
///
/// Partial replacement for the default route table. Every present field replaces the
/// corresponding default wholesale; absent fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfigOverride {
    pub public_paths: Option<Vec<String>>,
    pub protected_paths: Option<Vec<String>>,
    pub auth_required_paths: Option<Vec<String>>,
    pub auth_pages: Option<Vec<String>>,
    pub default_redirect: Option<String>,
}

/// PathClass
///
/// Membership of one request path in each of the four prefix sets.
/// The flags are independent: `/schools` is both auth-required and protected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathClass {
    pub public: bool,
    pub protected: bool,
    pub auth_required: bool,
    pub auth_page: bool,
}

fn owned(prefixes: &[&str]) -> Vec<String> {
    prefixes.iter().map(|p| p.to_string()).collect()
}

fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            public_paths: owned(&[
                "/",
                "/sign-in",
                "/forgot-password",
                "/auth",
                "/forbidden",
                "/health",
                "/robots.txt",
                "/sitemap.xml",
                "/manifest.webmanifest",
            ]),
            protected_paths: owned(&["/schools", "/users", "/students"]),
            auth_required_paths: owned(&[
                "/dashboard",
                "/schools",
                "/users",
                "/students",
                "/me",
                "/sign-out",
            ]),
            auth_pages: owned(&["/sign-in", "/forgot-password"]),
            default_redirect: "/dashboard".to_string(),
        }
    }
}

impl RouteConfig {
    /// Returns a new table with every field present in `overrides` replacing ours.
    pub fn with_override(&self, overrides: &RouteConfigOverride) -> Self {
        Self {
            public_paths: overrides
                .public_paths
                .clone()
                .unwrap_or_else(|| self.public_paths.clone()),
            protected_paths: overrides
                .protected_paths
                .clone()
                .unwrap_or_else(|| self.protected_paths.clone()),
            auth_required_paths: overrides
                .auth_required_paths
                .clone()
                .unwrap_or_else(|| self.auth_required_paths.clone()),
            auth_pages: overrides
                .auth_pages
                .clone()
                .unwrap_or_else(|| self.auth_pages.clone()),
            default_redirect: overrides
                .default_redirect
                .clone()
                .unwrap_or_else(|| self.default_redirect.clone()),
        }
    }

    /// classify
    ///
    /// Pure and total: every path string gets an answer, an empty prefix list never
    /// matches, and nothing is normalized before comparison.
    pub fn classify(&self, path: &str) -> PathClass {
        PathClass {
            public: matches_any(path, &self.public_paths),
            protected: matches_any(path, &self.protected_paths),
            auth_required: matches_any(path, &self.auth_required_paths),
            auth_page: matches_any(path, &self.auth_pages),
        }
    }
}
