use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience the identity provider stamps on access tokens of signed-in users.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Claims
///
/// The payload of an access token issued by the identity provider.
/// Tokens are HS256-signed with the project's JWT secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID in the identity provider, also the key of `profiles`.
    pub sub: Uuid,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    pub aud: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// TokenCheck
///
/// Why an access token was not accepted. An expired token is worth a refresh;
/// anything else is garbage and only a refresh token can still save the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Expired,
    Invalid,
}

/// decode_access_token
///
/// Validates signature, audience and expiry of an access token.
pub fn decode_access_token(token: &str, jwt_secret: &str) -> Result<Claims, TokenCheck> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_audience(&[TOKEN_AUDIENCE]);

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Err(TokenCheck::Expired),
            _ => Err(TokenCheck::Invalid),
        },
    }
}

/// AuthUser
///
/// The signed-in operator behind the current request. The request gate inserts it into
/// the request extensions once the session is resolved, so handlers never re-validate
/// tokens themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

/// AuthUser Extractor Implementation
///
/// Reads the identity the gate attached to the request.
/// Rejection: `401 Unauthorized` when the request reached the handler anonymously,
/// which only happens if the route table lets an anonymous request through to a
/// handler that needs an operator.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
