use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::{TokenCheck, decode_access_token},
    cookies::{self, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    error::SessionError,
    identity::IdentityState,
};

/// SessionIdentity
///
/// Who is behind a request, decided once per request from its cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdentity {
    Anonymous,
    User(Uuid),
}

/// SessionResolution
///
/// The identity plus every cookie issued while resolving it. The cookies must end up on
/// whatever response the request finally produces.
#[derive(Debug, Clone)]
pub struct SessionResolution {
    pub identity: SessionIdentity,
    pub cookies: Vec<Cookie<'static>>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self {
            identity: SessionIdentity::Anonymous,
            cookies: Vec::new(),
        }
    }
}

/// SessionResolver
///
/// Turns a request's cookies into a `SessionResolution`. Errors are identity-provider
/// outages and are not retried.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, jar: &CookieJar) -> Result<SessionResolution, SessionError>;
}

pub type SessionState = Arc<dyn SessionResolver>;

/// SupabaseSessionResolver
///
/// Validates the access-token cookie locally and falls back to the identity provider's
/// refresh grant when the access token is missing, expired or unreadable.
pub struct SupabaseSessionResolver {
    identity: IdentityState,
    jwt_secret: String,
    secure_cookies: bool,
}

impl SupabaseSessionResolver {
    pub fn new(identity: IdentityState, jwt_secret: &str, secure_cookies: bool) -> Self {
        Self {
            identity,
            jwt_secret: jwt_secret.to_string(),
            secure_cookies,
        }
    }

    fn signed_out(&self) -> SessionResolution {
        SessionResolution {
            identity: SessionIdentity::Anonymous,
            cookies: cookies::cleared_session_cookies(self.secure_cookies),
        }
    }
}

#[async_trait]
impl SessionResolver for SupabaseSessionResolver {
    async fn resolve(&self, jar: &CookieJar) -> Result<SessionResolution, SessionError> {
        let access_token = jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
        let refresh_token = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

        if let Some(token) = access_token.as_deref() {
            match decode_access_token(token, &self.jwt_secret) {
                Ok(claims) => {
                    return Ok(SessionResolution {
                        identity: SessionIdentity::User(claims.sub),
                        cookies: Vec::new(),
                    });
                }
                Err(TokenCheck::Expired) => tracing::debug!("access token expired"),
                Err(TokenCheck::Invalid) => tracing::debug!("access token rejected"),
            }
        }

        let Some(refresh_token) = refresh_token else {
            return Ok(if access_token.is_some() {
                self.signed_out()
            } else {
                SessionResolution::anonymous()
            });
        };

        match self.identity.refresh_session(&refresh_token).await? {
            Some(grant) => {
                tracing::debug!(user_id = %grant.user.id, "session refreshed");
                Ok(SessionResolution {
                    identity: SessionIdentity::User(grant.user.id),
                    cookies: cookies::session_cookies(&grant, self.secure_cookies),
                })
            }
            None => {
                tracing::info!("refresh token refused, clearing session cookies");
                Ok(self.signed_out())
            }
        }
    }
}
