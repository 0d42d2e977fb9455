use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::SessionError;

/// ProviderUser
///
/// The subset of the identity provider's user record the console needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// TokenGrant
///
/// A session issued by the identity provider's `/token` endpoint, whatever the
/// grant type (refresh, password, PKCE).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: ProviderUser,
}

/// IdentityProvider
///
/// The outbound contract with the hosted identity provider. `Ok(None)` means the
/// provider understood the request and refused it (bad credentials, revoked refresh
/// token, spent code); `Err` means the provider could not be reached or misbehaved.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<TokenGrant>, SessionError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenGrant>, SessionError>;

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Option<TokenGrant>, SessionError>;

    /// Sends the password recovery email. The provider answers success for unknown
    /// addresses too, so there is nothing to return. The emailed link comes back to
    /// `redirect_to` with a code that only redeems against `code_challenge`'s verifier.
    async fn send_password_recovery(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), SessionError>;

    /// Revokes the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError>;

    /// URL the browser is sent to for an OAuth sign-in with `provider`.
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;
}

/// IdentityState
///
/// Shared handle on the identity provider, the same way `RepositoryState` shares the database.
pub type IdentityState = Arc<dyn IdentityProvider>;

/// SupabaseAuthClient
///
/// `IdentityProvider` backed by the Supabase Auth (GoTrue) REST API.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    async fn token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Option<TokenGrant>, SessionError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<TokenGrant>().await?)),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(grant_type, status = %response.status(), "token grant refused");
                Ok(None)
            }
            status => Err(upstream(status, response).await),
        }
    }
}

async fn upstream(status: StatusCode, response: reqwest::Response) -> SessionError {
    SessionError::Upstream {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<TokenGrant>, SessionError> {
        self.token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenGrant>, SessionError> {
        self.token("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Option<TokenGrant>, SessionError> {
        self.token(
            "pkce",
            json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }

    async fn send_password_recovery(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), SessionError> {
        let response = self
            .http
            .post(format!("{}/recover", self.base_url))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "code_challenge": code_challenge,
                "code_challenge_method": "s256",
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(upstream(response.status(), response).await)
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // An already-expired session is as signed out as it gets.
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            status => Err(upstream(status, response).await),
        }
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        let base = format!("{}/authorize", self.base_url);
        let params = [
            ("provider", provider),
            ("redirect_to", redirect_to),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "s256"),
        ];
        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            // Only reachable with a malformed SUPABASE_URL; let the provider reject it.
            Err(_) => base,
        }
    }
}
