use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::AuthError;

/// Access token claims. `sub` is the username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn parse_algorithm(raw: &str) -> Result<Algorithm, AuthError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AuthError::TokenError(format!("unsupported algorithm {other}"))),
    }
}

/// Signs and verifies access tokens with one shared HMAC secret.
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenIssuer {
    /// Fails closed when no secret is configured.
    pub fn new(secret: Option<&str>, algorithm: Algorithm) -> Result<Self, AuthError> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::TokenError("signing secret not configured".into()))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::TokenError(format!("unsupported algorithm {algorithm:?}")));
        }
        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn issue_access_token(&self, subject: &str, ttl: chrono::Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::TokenError("access token expiry out of range".into()))?;
        let claims = Claims { sub: subject.to_string(), iat: now.timestamp(), exp: exp.timestamp() };
        encode(&Header::new(self.algorithm), &claims, &self.encoding).map_err(|e| AuthError::TokenError(e.to_string()))
    }

    /// Returns the subject. Bad signature, wrong algorithm, expiry and a
    /// missing subject are all `InvalidToken`.
    pub fn verify_access_token(&self, token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|_| AuthError::InvalidToken)?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}
