//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2 PHC strings. Tokens are signed claims:
//! `base64url(json(claims)) "." base64url(mac)`, where the MAC is a keyed
//! BLAKE3 hash of the encoded claims under a key derived from the configured
//! secret.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::User;

/// Context string for deriving the token signing key from the secret.
const TOKEN_KEY_CONTEXT: &str = "tastemark 2026-01-01 bearer token signing";

/// Hash a password into an Argon2 PHC string with a random salt.
///
/// # Errors
///
/// Returns an error if the system RNG or the hasher fails.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| Error::PasswordHash(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| Error::PasswordHash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a stored PHC string.
///
/// Unparseable hashes never verify.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Hash checked when a sign-in names an unknown user, so that both branches
/// pay for one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("tastemark-unknown-user").ok());

/// Check a password against the stored hash of a user that may not exist.
///
/// Without a hash the password is checked against a fixed dummy hash and the
/// result is always `false`.
#[must_use]
pub fn verify_user_password(hash: Option<&str>, password: &str) -> bool {
    match hash {
        Some(hash) => verify_password(hash, password),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(dummy, password);
            }
            false
        }
    }
}

/// The claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Id of the signed-in user.
    pub user_id: i64,
    /// Username of the signed-in user.
    pub username: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    key: [u8; 32],
    ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    /// Create an issuer whose tokens live for `ttl`.
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: blake3::derive_key(TOKEN_KEY_CONTEXT, secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `user`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue(&self, user: &User) -> Result<String> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Issue a token for `user` as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue_at(&self, user: &User, now: i64) -> Result<String> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: user.user_id,
            username: user.username.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = blake3::keyed_hash(&self.key, payload.as_bytes());
        Ok(format!(
            "{payload}.{}",
            URL_SAFE_NO_PAD.encode(signature.as_bytes())
        ))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error if the token is malformed, carries a bad
    /// signature, or has expired.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims> {
        let invalid = || Error::unauthorized("invalid token");

        let (payload, signature) = token.split_once('.').ok_or_else(invalid)?;
        let signature: [u8; 32] = URL_SAFE_NO_PAD
            .decode(signature)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(invalid)?;

        // blake3::Hash equality is constant-time
        let expected = blake3::keyed_hash(&self.key, payload.as_bytes());
        if expected != blake3::Hash::from(signature) {
            return Err(invalid());
        }

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;

        if claims.exp <= now {
            return Err(Error::unauthorized("token expired"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    fn user() -> User {
        User {
            user_id: 7,
            username: "ana".to_string(),
            hashed_password: String::new(),
            created_at: Utc::now(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::from_secs(3600))
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("not a phc string", "anything"));
    }

    #[test]
    fn test_verify_user_password() {
        let hash = hash_password("open sesame").unwrap();
        assert!(verify_user_password(Some(&hash), "open sesame"));
        assert!(!verify_user_password(Some(&hash), "close sesame"));
        assert!(!verify_user_password(None, "open sesame"));
        assert!(!verify_user_password(None, "tastemark-unknown-user"));
    }

    #[test]
    fn test_issue_and_verify_token() {
        let issuer = issuer();
        let token = issuer.issue_at(&user(), 1_000).unwrap();

        let claims = issuer.verify_at(&token, 1_001).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 4_600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at(&user(), 1_000).unwrap();

        let err = issuer.verify_at(&token, 4_600).unwrap_err();
        assert_eq!(err.to_string(), "token expired");
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = TokenIssuer::new("another-secret-abcdef", Duration::from_secs(60))
            .issue(&user())
            .unwrap();

        assert!(matches!(
            issuer().verify(&token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issuer = issuer();
        let token = issuer.issue(&user()).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = Claims {
            user_id: 1,
            username: "Admin".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");

        assert!(issuer.verify(&forged).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let issuer = issuer();
        for token in ["", "abc", "abc.def", "a.b.c", "....."] {
            assert!(issuer.verify(token).is_err(), "{token}");
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", issuer());
        assert!(debug.contains("<redacted>"));
    }
}
