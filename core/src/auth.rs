use crate::config::AuthConfig;
use crate::error::{ErrorCode, PostmapError};
use crate::model::UserId;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid jwt: {0}")]
    InvalidToken(String),
    #[error("jwt claim sub is not a user id: {0}")]
    InvalidSubject(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl PostmapError for AuthError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::InvalidSubject(_) => {
                ErrorCode::Unauthenticated
            }
            AuthError::Signing(_) | AuthError::Hashing(_) => ErrorCode::Internal,
        }
    }
}

/// Issues and verifies bearer tokens for signed-in users.
pub trait AuthProvider: Send + Sync {
    fn issue_token(&self, user_id: UserId) -> Result<String, AuthError>;
    fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

pub struct JwtAuthProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
    ttl_secs: u64,
}

impl JwtAuthProvider {
    pub fn new_hs256(secret: impl AsRef<[u8]>, issuer: Option<&str>, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer: issuer.map(str::to_string),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new_hs256(
            &config.jwt_secret,
            config.issuer.as_deref(),
            config.token_ttl_secs,
        )
    }
}

impl AuthProvider for JwtAuthProvider {
    fn issue_token(&self, user_id: UserId) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            exp: now + self.ttl_secs as usize,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let normalized = strip_bearer_scheme(token);
        if normalized.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let token_data = decode::<TokenClaims>(normalized, &self.decoding_key, &self.validation)
            .map_err(|err| {
                debug!(error = %err, "Rejected bearer token");
                AuthError::InvalidToken(err.to_string())
            })?;
        let sub = token_data.claims.sub;
        sub.parse::<UserId>()
            .map_err(|_| AuthError::InvalidSubject(sub))
    }
}

/// Drops a leading `Bearer` scheme in any case. A bare scheme leaves an empty token.
fn strip_bearer_scheme(header: &str) -> &str {
    let trimmed = header.trim();
    match trimmed.get(..6) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("bearer")
                && trimmed[6..].chars().next().map_or(true, char::is_whitespace) =>
        {
            trimmed[6..].trim()
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_claims(secret: &str, claims: &TokenClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn now() -> usize {
        Utc::now().timestamp() as usize
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let auth = JwtAuthProvider::new_hs256("test-secret", Some("postmap"), 300);
        let token = auth.issue_token(42).unwrap();

        assert_eq!(auth.verify(&token).unwrap(), 42);
        assert_eq!(auth.verify(&format!("Bearer {token}")).unwrap(), 42);
    }

    #[test]
    fn rejects_expired_token() {
        let auth = JwtAuthProvider::new_hs256("test-secret", None, 300);
        let claims = TokenClaims {
            sub: "7".to_string(),
            iss: None,
            exp: now() - 10,
            iat: now() - 20,
        };
        let token = encode_claims("test-secret", &claims);

        assert!(matches!(auth.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn rejects_invalid_signature() {
        let issuer = JwtAuthProvider::new_hs256("wrong-secret", None, 300);
        let verifier = JwtAuthProvider::new_hs256("expected-secret", None, 300);
        let token = issuer.issue_token(1).unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_subject() {
        let auth = JwtAuthProvider::new_hs256("test-secret", None, 300);
        let claims = TokenClaims {
            sub: "alice".to_string(),
            iss: None,
            exp: now() + 300,
            iat: now(),
        };
        let token = encode_claims("test-secret", &claims);

        let err = auth.verify(&token).unwrap_err();
        assert_eq!(err, AuthError::InvalidSubject("alice".to_string()));
        assert_eq!(err.error_code(), ErrorCode::Unauthenticated);
    }

    #[test]
    fn rejects_empty_token() {
        let auth = JwtAuthProvider::new_hs256("test-secret", None, 300);
        assert_eq!(auth.verify("   "), Err(AuthError::MissingToken));
        assert_eq!(auth.verify("Bearer "), Err(AuthError::MissingToken));
        assert_eq!(auth.verify("bearer"), Err(AuthError::MissingToken));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let auth = JwtAuthProvider::new_hs256("test-secret", None, 300);
        let token = auth.issue_token(9).unwrap();

        assert_eq!(auth.verify(&format!("BEARER  {token} ")).unwrap(), 9);
        assert!(matches!(
            auth.verify(&format!("Bearer{token}")),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
