use yeko_admin::paths::{PathClass, RouteConfig, RouteConfigOverride};

fn table(
    public: &[&str],
    protected: &[&str],
    auth_required: &[&str],
    auth_pages: &[&str],
) -> RouteConfig {
    let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    RouteConfig {
        public_paths: owned(public),
        protected_paths: owned(protected),
        auth_required_paths: owned(auth_required),
        auth_pages: owned(auth_pages),
        default_redirect: "/dashboard".to_string(),
    }
}

#[test]
fn test_classify_flags_are_independent() {
    let routes = RouteConfig::default();

    let class = routes.classify("/schools/42");
    assert!(class.protected);
    assert!(class.auth_required);
    assert!(!class.auth_page);

    let class = routes.classify("/dashboard");
    assert!(class.auth_required);
    assert!(!class.protected);
}

#[test]
fn test_classify_auth_pages() {
    let routes = RouteConfig::default();

    assert!(routes.classify("/sign-in").auth_page);
    assert!(routes.classify("/forgot-password").auth_page);
    assert!(!routes.classify("/auth/callback").auth_page);
}

#[test]
fn test_classify_is_literal_prefix_match() {
    let routes = RouteConfig::default();

    // No segment boundary: a longer word still matches.
    assert!(routes.classify("/schoolsabc").protected);
    // No normalization either.
    assert!(!routes.classify("/Schools").protected);
    assert!(!routes.classify("schools").protected);
    assert!(!routes.classify("//schools").protected);
}

#[test]
fn test_classify_empty_path_matches_nothing_but_root_prefix() {
    let routes = table(&["/"], &["/a"], &["/a"], &["/login"]);
    assert_eq!(routes.classify(""), PathClass::default());

    let routes = table(&[], &[], &[], &[]);
    assert_eq!(routes.classify("/anything"), PathClass::default());
}

#[test]
fn test_root_public_prefix_matches_every_path() {
    let routes = RouteConfig::default();
    assert!(routes.classify("/").public);
    assert!(routes.classify("/does-not-exist").public);
    assert!(routes.classify("/schools").public);
}

#[test]
fn test_override_replaces_present_fields_wholesale() {
    let defaults = RouteConfig::default();
    let overrides = RouteConfigOverride {
        protected_paths: Some(vec!["/billing".to_string()]),
        auth_pages: Some(vec![]),
        ..RouteConfigOverride::default()
    };

    let routes = defaults.with_override(&overrides);

    assert_eq!(routes.protected_paths, vec!["/billing".to_string()]);
    assert!(routes.auth_pages.is_empty());
    assert_eq!(routes.public_paths, defaults.public_paths);
    assert_eq!(routes.default_redirect, defaults.default_redirect);

    assert!(!routes.classify("/schools").protected);
    assert!(routes.classify("/billing/invoices").protected);
    assert!(!routes.classify("/sign-in").auth_page);
}

#[test]
fn test_override_deserializes_from_partial_json() {
    let overrides: RouteConfigOverride =
        serde_json::from_str(r#"{"default_redirect": "/home"}"#).unwrap();

    assert_eq!(overrides.default_redirect.as_deref(), Some("/home"));
    assert!(overrides.protected_paths.is_none());
}
