//! Explicit session state for API calls.
//!
//! Auth material comes from two places: an explicitly configured access key,
//! or short-lived keys handed out as cookies by the service. Cookie-sourced
//! keys carry an expiry claim and are renewed by hitting the unauthenticated
//! status endpoint, which refreshes the cookie jar as a side effect. All of
//! that state lives here rather than in ambient globals, so every call site
//! that needs a token goes through the same resolution path.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use percent_encoding::percent_decode_str;
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use url::Url;

use crate::api::types::SessionStatus;

/// Cookie holding the short-lived access key.
pub const ACCESS_KEY_COOKIE: &str = "ForgeVTT-AccessKey";
/// Cookie holding the anti-forgery token attached to mutating calls.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Treat a key as expired this many seconds early, so a key that is valid
/// when we build the request cannot expire before the server sees it.
const EXPIRY_LEEWAY_SECS: u64 = 60;

/// Claims carried in an access token's payload segment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    pub id: Option<String>,
    /// Expiry in epoch seconds.
    pub exp: Option<u64>,
}

/// Decode the claims of a `header.payload.signature` token.
///
/// Undecodable tokens yield empty claims rather than an error: an opaque
/// key is still sent to the server, which is the authority on validity.
pub fn token_claims(token: &str) -> TokenClaims {
    let Some(payload) = token.split('.').nth(1) else {
        return TokenClaims::default();
    };
    let trimmed = payload.trim_end_matches('=');
    let bytes = STANDARD_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed));
    match bytes {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => TokenClaims::default(),
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Whether a key's expiry claim has passed (with leeway). Keys without an
/// expiry claim never expire client-side.
pub fn is_key_expired(token: &str) -> bool {
    match token_claims(token).exp {
        Some(exp) => exp.saturating_sub(EXPIRY_LEEWAY_SECS) < epoch_now(),
        None => false,
    }
}

/// A usable configured key must identify a user and not be expired.
pub fn is_valid_api_key(token: &str) -> bool {
    token_claims(token).id.is_some() && !is_key_expired(token)
}

/// Session state shared by all API calls: the cookie jar, the configured
/// key, and the last status payload the service returned.
pub struct SessionContext {
    jar: Arc<Jar>,
    api_url: Url,
    api_key: Option<String>,
    last_status: RwLock<Option<SessionStatus>>,
}

impl SessionContext {
    pub fn new(api_url: Url, api_key: Option<String>) -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            api_url,
            api_key,
            last_status: RwLock::new(None),
        }
    }

    /// Cookie jar handle for the HTTP client builder. Sharing the jar is
    /// what lets us read back cookies set by the status call.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// The explicitly configured key, if it is still usable.
    pub fn configured_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| is_valid_api_key(key))
            .map(String::from)
    }

    /// Read a cookie value for the API host, percent-decoded.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.api_url)?;
        let header = header.to_str().ok()?;
        header.split("; ").find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key == name {
                Some(percent_decode_str(value).decode_utf8_lossy().into_owned())
            } else {
                None
            }
        })
    }

    pub fn cookie_access_key(&self) -> Option<String> {
        self.cookie(ACCESS_KEY_COOKIE)
    }

    pub fn cookie_xsrf_token(&self) -> Option<String> {
        self.cookie(XSRF_COOKIE)
    }

    /// Seed a cookie, as the host page would. Mostly useful for embedding
    /// and for tests.
    pub fn set_cookie(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}"), &self.api_url);
    }

    pub fn last_status(&self) -> Option<SessionStatus> {
        self.last_status.read().expect("session lock").clone()
    }

    pub fn record_status(&self, status: SessionStatus) {
        *self.last_status.write().expect("session lock") = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // header.payload.signature with payload {"id":"user123","exp":<far future>}
    fn token_with(id: Option<&str>, exp: Option<u64>) -> String {
        let mut claims = serde_json::Map::new();
        if let Some(id) = id {
            claims.insert("id".into(), id.into());
        }
        if let Some(exp) = exp {
            claims.insert("exp".into(), exp.into());
        }
        let payload = STANDARD_NO_PAD.encode(serde_json::Value::Object(claims).to_string());
        format!("eyJhbGciOiJIUzI1NiJ9.{payload}.c2ln")
    }

    #[test]
    fn test_claims_roundtrip() {
        let token = token_with(Some("user123"), Some(4102444800));
        let claims = token_claims(&token);
        assert_eq!(claims.id.as_deref(), Some("user123"));
        assert_eq!(claims.exp, Some(4102444800));
    }

    #[test]
    fn test_garbage_token_yields_empty_claims() {
        let claims = token_claims("not-a-token");
        assert!(claims.id.is_none());
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_expiry_leeway() {
        // Expires in 30 seconds: inside the 60 second leeway, counts expired.
        let soon = epoch_now() + 30;
        assert!(is_key_expired(&token_with(Some("u"), Some(soon))));
        let later = epoch_now() + 3600;
        assert!(!is_key_expired(&token_with(Some("u"), Some(later))));
        // No expiry claim: never expires client-side.
        assert!(!is_key_expired(&token_with(Some("u"), None)));
    }

    #[test]
    fn test_valid_key_requires_id() {
        let no_id = token_with(None, Some(epoch_now() + 3600));
        assert!(!is_valid_api_key(&no_id));
        let with_id = token_with(Some("u"), Some(epoch_now() + 3600));
        assert!(is_valid_api_key(&with_id));
    }

    #[test]
    fn test_cookie_read_back() {
        let session = SessionContext::new(Url::parse("https://forge-vtt.com").unwrap(), None);
        session.set_cookie(XSRF_COOKIE, "abc%20def");
        assert_eq!(session.cookie_xsrf_token().as_deref(), Some("abc def"));
        assert!(session.cookie_access_key().is_none());
    }

    #[test]
    fn test_configured_key_must_be_valid() {
        let expired = token_with(Some("u"), Some(1));
        let session =
            SessionContext::new(Url::parse("https://forge-vtt.com").unwrap(), Some(expired));
        assert!(session.configured_key().is_none());

        let good = token_with(Some("u"), Some(epoch_now() + 3600));
        let session = SessionContext::new(
            Url::parse("https://forge-vtt.com").unwrap(),
            Some(format!("  {good}  ")),
        );
        assert_eq!(session.configured_key().as_deref(), Some(good.as_str()));
    }
}
