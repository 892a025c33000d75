//! Shared-secret authentication for the ingestion endpoint.
//!
//! Implements constant-time comparison to mitigate timing attacks.

use axum::http::{header, HeaderMap, Method};
use chrono::Utc;
use subtle::ConstantTimeEq;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Request metadata recorded when authentication fails.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub path: String,
}

/// Verifies a presented credential against the configured secret.
pub struct Authenticator {
    secret: Option<String>,
}

impl Authenticator {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Check `provided` against the secret. Fails closed when no secret is configured.
    pub fn verify(&self, provided: Option<&str>, meta: &RequestMeta) -> bool {
        let Some(expected) = self.secret.as_deref() else {
            tracing::error!(
                method = %meta.method,
                path = %meta.path,
                "Ingestion secret is not configured (FOLKLORE_API_KEY); rejecting request"
            );
            return false;
        };

        let credential_present = provided.is_some_and(|p| !p.is_empty());
        let verified = match provided {
            Some(provided) if !provided.is_empty() => constant_time_compare(provided, expected),
            _ => false,
        };

        if !verified {
            tracing::debug!(
                timestamp = %Utc::now().to_rfc3339(),
                method = %meta.method,
                path = %meta.path,
                credential_present,
                "Authentication failed"
            );
        }

        verified
    }
}

/// Pull the credential from `x-api-key`, or from `Authorization: Bearer`.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.to_string())
}

/// Perform constant-time string comparison.
///
/// Both inputs are zero-padded to the longer length before comparing, and the
/// length check is folded in with a constant-time AND, so a length mismatch
/// costs the same as a content mismatch.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    let len = a_bytes.len().max(b_bytes.len());

    let mut padded_a = vec![0u8; len];
    let mut padded_b = vec![0u8; len];
    padded_a[..a_bytes.len()].copy_from_slice(a_bytes);
    padded_b[..b_bytes.len()].copy_from_slice(b_bytes);

    let same_len = (a_bytes.len() as u64).ct_eq(&(b_bytes.len() as u64));
    (padded_a.as_slice().ct_eq(padded_b.as_slice()) & same_len).into()
}
