use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AuthConfig, MAX_TOKEN_EXPIRED_MS};

/// Discriminates access tokens from refresh tokens inside the claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "main_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub authorities: Vec<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token kind does not match")]
    WrongKind,

    #[error("token is expired")]
    Expired,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Issues and verifies HS256 tokens. Refresh tokens live three times as long as access
/// tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_ms: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::milliseconds(access_ttl_ms.min(MAX_TOKEN_EXPIRED_MS) as i64),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_expired_ms)
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.access_ttl * 3,
        }
    }

    pub fn issue(&self, subject: &str, authorities: &[String], kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(subject, authorities, kind, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        authorities: &[String],
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires = now
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| TokenError::Encoding("expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            authorities: authorities.to_vec(),
            kind,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    /// Checks signature, then kind, then expiry.
    pub fn verify_at(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::InvalidSignature)?
            .claims;

        if claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
