mod common;

use common::{ADMIN_ID, MockRoles, OPERATOR_ID};
use std::sync::Arc;
use uuid::Uuid;
use yeko_admin::{
    RoleChecker,
    paths::{PathClass, RouteConfig},
    policy::{Decision, Verdict, decide, evaluate},
    session::SessionIdentity,
};

fn redirect(path: &str) -> Decision {
    Decision::RedirectTo(path.to_string())
}

async fn run(path: &str, identity: SessionIdentity, roles: &Arc<MockRoles>) -> Decision {
    let checker = RoleChecker::new(roles.clone());
    evaluate(&RouteConfig::default(), path, &identity, &checker).await
}

// --- The pure table ---

#[test]
fn test_anonymous_on_auth_required_or_protected_goes_to_sign_in() {
    let config = RouteConfig::default();
    for class in [
        PathClass { auth_required: true, ..PathClass::default() },
        PathClass { protected: true, ..PathClass::default() },
        PathClass { protected: true, auth_required: true, auth_page: true, public: true },
    ] {
        assert_eq!(
            decide(&config, &class, &SessionIdentity::Anonymous),
            Verdict::Final(redirect("/sign-in"))
        );
    }
}

#[test]
fn test_anonymous_elsewhere_continues() {
    let config = RouteConfig::default();
    for class in [
        PathClass::default(),
        PathClass { public: true, ..PathClass::default() },
        PathClass { auth_page: true, public: true, ..PathClass::default() },
    ] {
        assert_eq!(
            decide(&config, &class, &SessionIdentity::Anonymous),
            Verdict::Final(Decision::Continue)
        );
    }
}

#[test]
fn test_signed_in_auth_page_wins_over_protected() {
    let config = RouteConfig::default();
    let class = PathClass { auth_page: true, protected: true, ..PathClass::default() };

    assert_eq!(
        decide(&config, &class, &SessionIdentity::User(OPERATOR_ID)),
        Verdict::Final(redirect("/dashboard"))
    );
}

#[test]
fn test_signed_in_protected_needs_admin() {
    let config = RouteConfig::default();
    let class = PathClass { protected: true, auth_required: true, ..PathClass::default() };

    assert_eq!(
        decide(&config, &class, &SessionIdentity::User(OPERATOR_ID)),
        Verdict::NeedsAdmin(OPERATOR_ID)
    );
}

#[test]
fn test_settle() {
    assert_eq!(Verdict::NeedsAdmin(OPERATOR_ID).settle(true), Decision::Continue);
    assert_eq!(
        Verdict::NeedsAdmin(OPERATOR_ID).settle(false),
        redirect("/forbidden")
    );
    assert_eq!(
        Verdict::Final(redirect("/x")).settle(true),
        redirect("/x")
    );
}

#[test]
fn test_default_redirect_comes_from_config() {
    let config = RouteConfig {
        default_redirect: "/home".to_string(),
        ..RouteConfig::default()
    };
    let class = config.classify("/sign-in");

    assert_eq!(
        decide(&config, &class, &SessionIdentity::User(OPERATOR_ID)),
        Verdict::Final(redirect("/home"))
    );
}

// --- Scenarios with a role store ---

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_sign_in() {
    let roles = Arc::new(MockRoles::default());
    let decision = run("/dashboard", SessionIdentity::Anonymous, &roles).await;

    assert_eq!(decision, redirect("/sign-in"));
    assert_eq!(roles.lookup_count(), 0);
}

#[tokio::test]
async fn test_signed_in_on_sign_in_goes_to_default_redirect() {
    let roles = Arc::new(MockRoles::default());
    let decision = run("/sign-in", SessionIdentity::User(OPERATOR_ID), &roles).await;

    assert_eq!(decision, redirect("/dashboard"));
    assert_eq!(roles.lookup_count(), 0);
}

#[tokio::test]
async fn test_admin_reaches_protected_path() {
    let roles = Arc::new(MockRoles::admins(&[ADMIN_ID]));
    let decision = run("/schools/1", SessionIdentity::User(ADMIN_ID), &roles).await;

    assert_eq!(decision, Decision::Continue);
    assert_eq!(roles.lookup_count(), 1);
}

#[tokio::test]
async fn test_non_admin_on_protected_path_is_forbidden() {
    let roles = Arc::new(MockRoles::admins(&[ADMIN_ID]));
    let decision = run("/schools", SessionIdentity::User(OPERATOR_ID), &roles).await;

    assert_eq!(decision, redirect("/forbidden"));
}

#[tokio::test]
async fn test_role_store_failure_fails_closed() {
    let roles = Arc::new(MockRoles::failing());
    let decision = run("/users", SessionIdentity::User(ADMIN_ID), &roles).await;

    assert_eq!(decision, redirect("/forbidden"));
    assert_eq!(roles.lookup_count(), 1);
}

#[tokio::test]
async fn test_signed_in_dashboard_continues_without_role_lookup() {
    let roles = Arc::new(MockRoles::failing());
    let decision = run("/dashboard", SessionIdentity::User(OPERATOR_ID), &roles).await;

    assert_eq!(decision, Decision::Continue);
    assert_eq!(roles.lookup_count(), 0);
}

#[tokio::test]
async fn test_unmatched_path_continues_for_everyone() {
    let roles = Arc::new(MockRoles::default());
    let config = RouteConfig {
        public_paths: vec![],
        ..RouteConfig::default()
    };
    let checker = RoleChecker::new(roles.clone());

    for identity in [SessionIdentity::Anonymous, SessionIdentity::User(Uuid::new_v4())] {
        let decision = evaluate(&config, "/nowhere", &identity, &checker).await;
        assert_eq!(decision, Decision::Continue);
    }
    assert_eq!(roles.lookup_count(), 0);
}

#[tokio::test]
async fn test_role_lookups_are_not_cached() {
    let roles = Arc::new(MockRoles::admins(&[ADMIN_ID]));
    for _ in 0..3 {
        run("/students", SessionIdentity::User(ADMIN_ID), &roles).await;
    }
    assert_eq!(roles.lookup_count(), 3);
}
