//! Password hashing and cookie session tokens.
//!
//! Sessions are HS256 JWTs carried in an HttpOnly cookie, issued with a
//! fixed TTL. The signing secret comes from `TLU_SESSION_SECRET`; without
//! one a random per-process secret is generated, which invalidates all
//! sessions on restart.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Session lifetime (8 hours).
pub const SESSION_TTL_HOURS: i64 = 8;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token")]
    InvalidToken,
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SessionClaims {
    /// Member id
    sub: Uuid,
    iat: i64,
    exp: i64,
    aud: String,
}

/// A validated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub member_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
}

impl SessionService {
    /// Build from `TLU_SESSION_SECRET`, falling back to a per-process
    /// random secret.
    pub fn from_env() -> Self {
        match std::env::var("TLU_SESSION_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => Self::new(secret.as_bytes()),
            _ => {
                warn!(
                    "TLU_SESSION_SECRET not set; using a random secret, \
                     sessions will not survive a restart"
                );
                let secret: [u8; 32] = rand::rng().random();
                Self::new(&secret)
            }
        }
    }

    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
        }
    }

    pub fn issue(&self, member_id: Uuid) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: member_id,
            iat: now.timestamp(),
            exp: (now + ChronoDuration::hours(SESSION_TTL_HOURS)).timestamp(),
            aud: "session".to_string(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn validate(&self, token: &str) -> Result<Session, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["session"]);
        validation.leeway = 30; // clock skew

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        let expires_at =
            DateTime::from_timestamp(data.claims.exp, 0).ok_or(SessionError::InvalidToken)?;

        Ok(Session {
            member_id: data.claims.sub,
            expires_at,
        })
    }
}

/// Hash a password as `sha256$<salt hex>$<digest hex>` with a random
/// 16-byte salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    let digest = salted_digest(&salt, password);
    format!("sha256${}${}", hex(&salt), hex(&digest))
}

/// Constant-format check against a stored `sha256$salt$digest` string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some("sha256"), Some(salt_hex), Some(digest_hex)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Some(salt) = unhex(salt_hex) else {
        return false;
    };
    hex(&salted_digest(&salt, password)) == digest_hex
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn unhex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let digest = hash_password("hunter2");
        assert!(digest.starts_with("sha256$"));
        assert!(verify_password("hunter2", &digest));
        assert!(!verify_password("hunter3", &digest));

        // Same password gets a different salt each time
        assert_ne!(digest, hash_password("hunter2"));
    }

    #[test]
    fn test_verify_rejects_malformed_digests() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "plaintext"));
        assert!(!verify_password("x", "md5$00$00"));
        assert!(!verify_password("x", "sha256$zz$00"));
    }

    #[test]
    fn test_issue_and_validate_session() {
        let service = SessionService::new(b"test-secret-test-secret-test-sec");
        let member_id = Uuid::new_v4();

        let token = service.issue(member_id).unwrap();
        let session = service.validate(&token).unwrap();
        assert_eq!(session.member_id, member_id);
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = SessionService::new(b"secret-a");
        let verifier = SessionService::new(b"secret-b");

        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(verifier.validate(&token).is_err());
        assert!(matches!(
            verifier.validate(""),
            Err(SessionError::InvalidToken)
        ));
    }
}
