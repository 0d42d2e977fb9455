use uuid::Uuid;

use crate::{
    paths::{FORBIDDEN_PATH, PathClass, RouteConfig, SIGN_IN_PATH},
    roles::RoleChecker,
    session::SessionIdentity,
};

/// Decision
///
/// What the gate does with a request: hand it to the router, or redirect the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    RedirectTo(String),
}

/// Verdict
///
/// Output of the pure part of the policy. `NeedsAdmin` is the only branch that depends on
/// the role store, and it is the last one the table can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Final(Decision),
    NeedsAdmin(Uuid),
}

impl Verdict {
    /// Settles a `NeedsAdmin` verdict with the role check's answer.
    pub fn settle(self, is_admin: bool) -> Decision {
        match self {
            Verdict::Final(decision) => decision,
            Verdict::NeedsAdmin(_) if is_admin => Decision::Continue,
            Verdict::NeedsAdmin(_) => Decision::RedirectTo(FORBIDDEN_PATH.to_string()),
        }
    }
}

/// decide
///
/// The decision table. Branches are tried in order and the first hit wins:
///
/// 1. anonymous on an auth-required or admin-only path: sign in first
/// 2. anonymous anywhere else: serve it
/// 3. signed in on an auth page: go to the default page
/// 4. signed in on an admin-only path: depends on the role check
/// 5. signed in anywhere else: serve it
///
/// Paths no prefix list matches fall through to "serve it".
pub fn decide(config: &RouteConfig, class: &PathClass, identity: &SessionIdentity) -> Verdict {
    match identity {
        SessionIdentity::Anonymous if class.auth_required || class.protected => {
            Verdict::Final(Decision::RedirectTo(SIGN_IN_PATH.to_string()))
        }
        SessionIdentity::Anonymous => Verdict::Final(Decision::Continue),
        SessionIdentity::User(_) if class.auth_page => {
            Verdict::Final(Decision::RedirectTo(config.default_redirect.clone()))
        }
        SessionIdentity::User(user_id) if class.protected => Verdict::NeedsAdmin(*user_id),
        SessionIdentity::User(_) => Verdict::Final(Decision::Continue),
    }
}

/// evaluate
///
/// Classifies `path`, runs the table and performs the role lookup only when the table
/// asks for it.
pub async fn evaluate(
    config: &RouteConfig,
    path: &str,
    identity: &SessionIdentity,
    roles: &RoleChecker,
) -> Decision {
    let class = config.classify(path);
    match decide(config, &class, identity) {
        Verdict::NeedsAdmin(user_id) => {
            let is_admin = roles.is_super_admin(user_id).await;
            if !is_admin {
                tracing::info!(%user_id, path, "admin-only path refused");
            }
            Verdict::NeedsAdmin(user_id).settle(is_admin)
        }
        Verdict::Final(decision) => decision,
    }
}
