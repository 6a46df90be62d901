use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer-token claims for both end users and reviewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    /// "user" for regular accounts; privileged roles ("admin", "moderator",
    /// "reviewer") are exempt from the verification pipeline.
    pub role: String,
    pub exp: i64,
}

impl Claims {
    pub fn is_privileged(&self) -> bool {
        self.role != "user"
    }

    pub fn can_review(&self) -> bool {
        matches!(self.role.as_str(), "reviewer" | "admin")
    }
}

/// Decodes HS256 bearer tokens from the Authorization header.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Extract and verify the bearer token from request headers.
    pub fn claims_from_headers(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?;

        self.verify(token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, secret: &str) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: role.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_roundtrip() {
        let verifier = TokenVerifier::new("secret");
        let claims = verifier.verify(&token("user", "secret")).unwrap();
        assert_eq!(claims.role, "user");
        assert!(!claims.is_privileged());
        assert!(!claims.can_review());
    }

    #[test]
    fn reviewer_role_can_review() {
        let verifier = TokenVerifier::new("secret");
        let claims = verifier.verify(&token("reviewer", "secret")).unwrap();
        assert!(claims.is_privileged());
        assert!(claims.can_review());
    }

    #[test]
    fn wrong_secret_rejected() {
        let verifier = TokenVerifier::new("secret");
        assert!(verifier.verify(&token("user", "other")).is_err());
    }

    #[test]
    fn missing_header_rejected() {
        let verifier = TokenVerifier::new("secret");
        let headers = HeaderMap::new();
        assert!(matches!(
            verifier.claims_from_headers(&headers),
            Err(AuthError::MissingToken)
        ));
    }
}
