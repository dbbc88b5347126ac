//! Password hashing and bearer-token auth.
//!
//! Passwords are stored as `salt$hash` where the hash is SHA-256 over
//! salt and password. Tokens are two base64url segments,
//! `payload.signature`, signed with HMAC-SHA256 and carrying
//! `{sub, exp}` claims. Verification is constant-time through the MAC.

use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use neurochat_core::error::AuthError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::SharedState;

type HmacSha256 = Hmac<Sha256>;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

/// Check a password against a stored `salt$hash` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => digest(salt, password) == hash,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Claims carried inside a bearer token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    /// Username the token was issued to
    sub: String,
    /// Expiry as a unix timestamp
    exp: i64,
}

/// Issues and verifies HMAC-signed bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_minutes: u64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl: Duration::minutes(ttl_minutes as i64),
        }
    }

    /// Issue a token for a username, valid for the configured TTL.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| AuthError::InvalidToken(format!("claims encoding: {e}")))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let signature = self.sign(payload_b64.as_bytes())?;
        Ok(format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a token and return the username it was issued to.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let (payload_b64, signature_b64) = token
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidToken("malformed token".into()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken("bad signature encoding".into()))?;

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AuthError::InvalidToken("bad signing key".into()))?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken("signature mismatch".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken("bad payload encoding".into()))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| AuthError::InvalidToken("bad claims".into()))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims.sub)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AuthError::InvalidToken("bad signing key".into()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// The authenticated username, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Middleware guarding protected routes: validates the
/// `Authorization: Bearer` header and stashes the username.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let username = state
        .tokens
        .verify(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(CurrentUser(username));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("secret_password");
        assert!(verify_password("secret_password", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_rejected() {
        assert!(!verify_password("anything", "no-dollar-sign"));
    }

    #[test]
    fn token_roundtrip() {
        let signer = TokenSigner::new("test-secret", 30);
        let token = signer.issue("alice").unwrap();
        assert_eq!(signer.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn tampered_token_rejected() {
        let signer = TokenSigner::new("test-secret", 30);
        let token = signer.issue("alice").unwrap();
        let mut tampered = token.clone();
        tampered.insert(3, 'x');
        assert!(signer.verify(&tampered).is_err());
    }

    #[test]
    fn wrong_key_rejected() {
        let signer = TokenSigner::new("test-secret", 30);
        let other = TokenSigner::new("other-secret", 30);
        let token = signer.issue("alice").unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let signer = TokenSigner::new("test-secret", 0);
        let claims = TokenClaims {
            sub: "alice".into(),
            exp: (Utc::now() - Duration::minutes(1)).timestamp(),
        };
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let signature = signer.sign(payload_b64.as_bytes()).unwrap();
        let token = format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(signature));
        assert!(matches!(signer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn garbage_token_rejected() {
        let signer = TokenSigner::new("test-secret", 30);
        assert!(signer.verify("not-a-token").is_err());
        assert!(signer.verify("a.b").is_err());
        assert!(signer.verify("").is_err());
    }
}
