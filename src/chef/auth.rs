//! Chef server request signing.
//!
//! Implements authentication protocol version 1.3: the canonical request is
//! hashed with SHA-256 and signed with the client's RSA key (PKCS#1 v1.5).
//! The base64 signature is spread across `X-Ops-Authorization-N` headers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::error::{ChefApiError, ConfigError};

/// Signing protocol version advertised in `X-Ops-Sign`.
pub const SIGN_VERSION: &str = "1.3";

/// Server API version requested in `X-Ops-Server-API-Version`.
pub const SERVER_API_VERSION: &str = "1";

/// Client version advertised in `X-Chef-Version`.
pub const CHEF_VERSION: &str = "17.10.0";

/// Width of each `X-Ops-Authorization-N` header value.
const AUTH_HEADER_WIDTH: usize = 60;

/// Signs requests on behalf of a Chef API client.
#[derive(Clone)]
pub struct RequestSigner {
    /// Client (or user) name sent as `X-Ops-UserId`.
    client_name: String,
    /// Private key registered for the client.
    key: RsaPrivateKey,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Creates a signer from an already-decoded key.
    #[must_use]
    pub fn new(client_name: impl Into<String>, key: RsaPrivateKey) -> Self {
        Self {
            client_name: client_name.into(),
            key,
        }
    }

    /// Creates a signer from PEM key material (PKCS#1 or PKCS#8).
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be decoded as an RSA private key.
    pub fn from_pem(client_name: impl Into<String>, pem: &str) -> Result<Self, ConfigError> {
        let pem = pem.trim();
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ConfigError::invalid_key(format!("not an RSA private key: {e}")))?;

        Ok(Self::new(client_name, key))
    }

    /// Returns the client name used for signing.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Computes the authentication headers for one request.
    ///
    /// `path` is the URL path only, without the query string.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSA signature cannot be produced.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, ChefApiError> {
        let content_hash = content_hash(body);
        let timestamp = format_timestamp(timestamp);
        let canonical = canonical_request(
            method,
            path,
            &content_hash,
            &timestamp,
            &self.client_name,
        );

        let digest = Sha256::digest(canonical.as_bytes());
        let signature = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| ChefApiError::SigningFailed {
                message: e.to_string(),
            })?;
        let encoded = STANDARD.encode(signature);

        let mut headers = vec![
            (String::from("X-Ops-Sign"), format!("version={SIGN_VERSION}")),
            (String::from("X-Ops-UserId"), self.client_name.clone()),
            (String::from("X-Ops-Timestamp"), timestamp),
            (String::from("X-Ops-Content-Hash"), content_hash),
            (
                String::from("X-Ops-Server-API-Version"),
                String::from(SERVER_API_VERSION),
            ),
            (String::from("X-Chef-Version"), String::from(CHEF_VERSION)),
        ];

        // base64 output is ASCII, so byte chunks are valid UTF-8.
        for (i, chunk) in encoded.as_bytes().chunks(AUTH_HEADER_WIDTH).enumerate() {
            headers.push((
                format!("X-Ops-Authorization-{}", i + 1),
                String::from_utf8_lossy(chunk).into_owned(),
            ));
        }

        Ok(headers)
    }
}

/// Base64 SHA-256 of a request body.
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Formats a timestamp the way the Chef server expects it.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Collapses repeated slashes and drops a trailing slash.
#[must_use]
pub fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_slash {
                out.push(c);
            }
            last_slash = true;
        } else {
            out.push(c);
            last_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Builds the string that gets signed.
#[must_use]
pub fn canonical_request(
    method: &str,
    path: &str,
    content_hash: &str,
    timestamp: &str,
    user_id: &str,
) -> String {
    format!(
        "Method:{}\nPath:{}\nX-Ops-Content-Hash:{content_hash}\nX-Ops-Sign:version={SIGN_VERSION}\nX-Ops-Timestamp:{timestamp}\nX-Ops-UserId:{user_id}\nX-Ops-Server-API-Version:{SERVER_API_VERSION}",
        method.to_ascii_uppercase(),
        canonical_path(path),
    )
}
