//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying `sub`, `iat` and `exp`. Expiry is checked
//! against the caller-supplied `now` rather than the system clock, so every
//! time-dependent decision is made by the caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::AppError;

const KEY_SIZE: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token")]
    Malformed,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Symmetric signing key, fixed for the lifetime of the process.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, AppError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::ConfigError(format!("Invalid signing key: {}", e)))?;

        if bytes.len() < KEY_SIZE {
            return Err(AppError::ConfigError(format!(
                "Signing key must be at least {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }

        Ok(Self { bytes })
    }

    /// Returns the configured key, or a freshly generated one when none is set.
    /// The boolean is true when the key was generated.
    pub fn from_config(config: &AuthConfig) -> Result<(Self, bool), AppError> {
        match config.jwt_secret.as_deref() {
            Some(encoded) => Ok((Self::from_base64(encoded)?, false)),
            None => Ok((Self::generate(), true)),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("len", &self.bytes.len()).finish()
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: &SigningKey, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(&key.bytes),
            decoding: DecodingKey::from_secret(&key.bytes),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Encoding("token expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Returns the token's claims when the signature matches and `now < exp`.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::Malformed);
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.decode(token, now).map(|claims| claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SigningKey::generate(), Duration::minutes(60))
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue("mina@x.com", now).unwrap();

        assert_eq!(codec.verify(&token, now).unwrap(), "mina@x.com");

        let claims = codec.decode(&token, now).unwrap();
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, (now + Duration::minutes(60)).timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec.issue("mina@x.com", issued_at).unwrap();

        let just_before = issued_at + Duration::minutes(60) - Duration::seconds(1);
        assert!(codec.verify(&token, just_before).is_ok());

        let at_expiry = issued_at + Duration::minutes(60);
        assert_eq!(codec.verify(&token, at_expiry), Err(TokenError::Expired));

        let long_after = issued_at + Duration::days(3);
        assert_eq!(codec.verify(&token, long_after), Err(TokenError::Expired));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issuer = codec();
        let verifier = codec();
        let now = Utc::now();
        let token = issuer.issue("mina@x.com", now).unwrap();

        assert_eq!(verifier.verify(&token, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_foreign_key_and_expired_is_bad_signature() {
        let issuer = codec();
        let verifier = codec();
        let issued_at = Utc::now();
        let token = issuer.issue("mina@x.com", issued_at).unwrap();

        let later = issued_at + Duration::hours(2);
        assert_eq!(verifier.verify(&token, later), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue("mina@x.com", now).unwrap();
        let other = codec.issue("eve@x.com", now).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(codec.verify(&forged, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = codec();
        let now = Utc::now();

        assert_eq!(codec.verify("", now), Err(TokenError::Malformed));
        assert_eq!(codec.verify("not-a-token", now), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c", now), Err(TokenError::Malformed));
    }

    #[test]
    fn test_configured_key_is_stable() {
        let encoded = BASE64.encode([7u8; KEY_SIZE]);
        let first = TokenCodec::new(&SigningKey::from_base64(&encoded).unwrap(), Duration::minutes(5));
        let second = TokenCodec::new(&SigningKey::from_base64(&encoded).unwrap(), Duration::minutes(5));
        let now = Utc::now();

        let token = first.issue("mina@x.com", now).unwrap();
        assert_eq!(second.verify(&token, now).unwrap(), "mina@x.com");
    }

    #[test]
    fn test_short_or_invalid_key_rejected() {
        assert!(SigningKey::from_base64(&BASE64.encode([1u8; 8])).is_err());
        assert!(SigningKey::from_base64("%%%").is_err());
    }

    #[test]
    fn test_out_of_range_expiry_is_an_error() {
        let codec = TokenCodec::new(&SigningKey::generate(), Duration::days(365 * 1_000_000));

        assert!(matches!(
            codec.issue("mina@x.com", Utc::now()),
            Err(TokenError::Encoding(_))
        ));
    }
}
