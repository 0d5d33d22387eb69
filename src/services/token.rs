//! Signed session tokens.
//!
//! A token is `base64url(claims JSON) "." base64url(HMAC-SHA256(payload))`.
//! Tokens are stateless: validity is decided from the signature and the
//! `exp` claim alone, on every request.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::domain::{AccountId, Principal, Role};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Bad token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

/// Token claims. `iat` and `exp` are Unix timestamps in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i32,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionTokens {
    mac: HmacSha256,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionTokens {
    pub fn new(key: &[u8], ttl: chrono::Duration) -> anyhow::Result<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("Invalid session token key: {e}"))?;
        Ok(Self { mac, ttl })
    }

    /// Uses `security.token_secret`, or a random key when none is configured.
    pub fn from_config(security: &SecurityConfig) -> anyhow::Result<Self> {
        let ttl = chrono::Duration::minutes(security.session_ttl_minutes);

        if security.token_secret.is_empty() {
            warn!("No token secret configured; sessions will not survive a restart");
            let key: [u8; 32] = rand::random();
            return Self::new(&key, ttl);
        }

        Self::new(security.token_secret.as_bytes(), ttl)
    }

    #[must_use]
    pub const fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Signs a token for `principal`. The returned `expires_at` is exactly
    /// the instant `verify` starts rejecting it.
    #[must_use]
    pub fn issue(&self, principal: Principal, now: DateTime<Utc>) -> IssuedToken {
        let exp = (now + self.ttl).timestamp_millis();
        let expires_at = DateTime::from_timestamp_millis(exp).unwrap_or(now + self.ttl);
        let claims = SessionClaims {
            sub: principal.account_id.value(),
            role: principal.role,
            iat: now.timestamp_millis(),
            exp,
        };

        // Plain integers and a unit enum; serialization is infallible.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));

        IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at,
        }
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if now.timestamp_millis() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(Principal::new(AccountId::new(claims.sub), claims.role))
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
