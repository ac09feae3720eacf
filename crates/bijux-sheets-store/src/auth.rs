// SPDX-License-Identifier: Apache-2.0

use crate::StoreError;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, instrument};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const JWT_HEADER: &[u8] = br#"{"alg":"RS256","typ":"JWT"}"#;
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait AccessTokenSource: Send + Sync + 'static {
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// A bearer token issued out of band.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.token.clone())
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

impl ServiceAccountKey {
    /// Keys copied out of a JSON key file into an env var usually carry
    /// literal `\n` sequences; those are turned back into newlines.
    #[must_use]
    pub fn new(client_email: impl Into<String>, private_key: &str) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.replace("\\n", "\n"),
            token_uri: default_token_uri(),
        }
    }

    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Parses a Google service-account JSON key file.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Auth(format!("service account key parse failed: {e}")))
    }

    /// RS256-signed JWT asserting this account for the spreadsheets scope.
    pub fn signed_assertion(&self, issued_at: u64) -> Result<String, StoreError> {
        let claims = serde_json::to_vec(&AssertionClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        })
        .map_err(|e| StoreError::Auth(format!("claims encode failed: {e}")))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let pkey = PKey::private_key_from_pem(self.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid service account private key: {e}")))?;
        let mut signer = Signer::new(MessageDigest::sha256(), &pkey)
            .map_err(|e| StoreError::Auth(format!("signer init failed: {e}")))?;
        signer
            .update(signing_input.as_bytes())
            .map_err(|e| StoreError::Auth(format!("signing failed: {e}")))?;
        let signature = signer
            .sign_to_vec()
            .map_err(|e| StoreError::Auth(format!("signing failed: {e}")))?;
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Exchanges signed assertions for OAuth access tokens and caches each token
/// until shortly before it expires.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    #[must_use]
    pub fn new(key: ServiceAccountKey) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            key,
            client,
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    #[instrument(name = "sheets_token_exchange", skip(self), fields(client_email = %self.key.client_email))]
    async fn exchange(&self) -> Result<CachedToken, StoreError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let assertion = self.key.signed_assertion(issued_at)?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Auth(format!("token request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("token response parse failed: {e}")))?;
        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        info!(expires_in_secs = lifetime.as_secs(), "service account token refreshed");
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < current.expires_at {
                return Ok(current.token.clone());
            }
        }
        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;
    use openssl::sign::Verifier;

    fn test_key() -> (ServiceAccountKey, PKey<openssl::pkey::Private>) {
        let rsa = Rsa::generate(2048).expect("generate rsa key");
        let pkey = PKey::from_rsa(rsa).expect("pkey");
        let pem = String::from_utf8(pkey.private_key_to_pem_pkcs8().expect("pem")).expect("utf8");
        let escaped = pem.replace('\n', "\\n");
        (
            ServiceAccountKey::new("svc@project.iam.gserviceaccount.com", &escaped),
            pkey,
        )
    }

    #[test]
    fn escaped_newlines_are_restored() {
        let key = ServiceAccountKey::new("a@b", "-----BEGIN-----\\nabc\\n-----END-----");
        assert_eq!(key.private_key, "-----BEGIN-----\nabc\n-----END-----");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("abc"));
    }

    #[test]
    fn assertion_is_a_verifiable_rs256_jwt() {
        let (key, pkey) = test_key();
        let jwt = key.signed_assertion(1_700_000_000).expect("assertion");
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).expect("header b64"))
                .expect("header json");
        assert_eq!(header["alg"], "RS256");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).expect("claims b64"))
                .expect("claims json");
        assert_eq!(claims["iss"], "svc@project.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], SPREADSHEETS_SCOPE);
        assert_eq!(claims["aud"], DEFAULT_TOKEN_URI);
        assert_eq!(claims["exp"], 1_700_003_600_u64);

        let signature = URL_SAFE_NO_PAD.decode(parts[2]).expect("signature b64");
        let mut verifier = Verifier::new(MessageDigest::sha256(), &pkey).expect("verifier");
        verifier
            .update(format!("{}.{}", parts[0], parts[1]).as_bytes())
            .expect("verify update");
        assert!(verifier.verify(&signature).expect("verify"));
    }

    #[test]
    fn garbage_private_key_is_an_auth_error() {
        let key = ServiceAccountKey::new("svc@x", "not a pem");
        assert!(matches!(
            key.signed_assertion(0),
            Err(StoreError::Auth(_))
        ));
    }

    #[test]
    fn key_file_json_parses_with_default_token_uri() {
        let key = ServiceAccountKey::from_json(
            br#"{"type":"service_account","client_email":"svc@x","private_key":"pem"}"#,
        )
        .expect("key json");
        assert_eq!(key.client_email, "svc@x");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }
}
