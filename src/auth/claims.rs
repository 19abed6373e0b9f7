//! Signed-token verification and trusted claims injection.
//!
//! The token travels in a cookie as a compact RS256 JWS. When it verifies,
//! its claims are forwarded to the backend as JSON in [`TRUSTED_CLAIMS_HEADER`].
//! Anything else (no cookie, bad signature, expired token) forwards the
//! request without the header.

use std::fmt;
use std::path::Path;

use axum::http::{header, HeaderMap, HeaderValue};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::config::AuthConfig;
use crate::error::{error_chain, AuthError};

/// Header carrying verified claims. Only the gateway ever sets it.
pub const TRUSTED_CLAIMS_HEADER: &str = "x-bw7-token";

/// Claims of a verified token.
pub type Claims = Map<String, Value>;

pub struct ClaimsInjector {
    cookie_name: String,
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for ClaimsInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsInjector")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl ClaimsInjector {
    /// Build an injector from a PEM-encoded RSA public key.
    pub fn from_rsa_pem(cookie_name: impl Into<String>, pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(AuthError::Key)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.validate_nbf = true;

        Ok(Self {
            cookie_name: cookie_name.into(),
            key,
            validation,
        })
    }

    /// Load the key named by `config`. `Ok(None)` when auth is not configured.
    pub fn from_config(config: &AuthConfig) -> Result<Option<Self>, AuthError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let path = Path::new(&config.public_key_path);
        let pem = std::fs::read(path).map_err(|source| AuthError::KeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_rsa_pem(config.cookie_name.clone(), &pem).map(Some)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Verify `token` and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::Token)
    }

    /// Remove any client-supplied claims header, then set it from the
    /// cookie token if that verifies. Returns whether claims were attached.
    pub fn inject(&self, headers: &mut HeaderMap) -> bool {
        if headers.remove(TRUSTED_CLAIMS_HEADER).is_some() {
            tracing::warn!("Dropped client-supplied trusted claims header");
        }

        let Some(token) = cookie_value(headers, &self.cookie_name) else {
            return false;
        };

        let value = self.verify(token).and_then(|claims| {
            let json = serde_json::to_string(&claims).map_err(AuthError::Claims)?;
            Ok(HeaderValue::from_bytes(json.as_bytes())?)
        });

        match value {
            Ok(value) => {
                headers.insert(TRUSTED_CLAIMS_HEADER, value);
                true
            }
            Err(e) => {
                tracing::warn!(cookie = %self.cookie_name, error = %error_chain(&e), "Ignoring unverifiable token");
                false
            }
        }
    }
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}
