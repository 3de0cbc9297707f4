//! Low-level request envelope for the asset service.
//!
//! Every call goes through [`ApiClient`]: auth header resolution (with
//! fail-fast when no key is available), anti-forgery token attachment on
//! mutating calls, optional four-phase progress reporting, and mapping of
//! the service's `{code, error}` envelope into [`ApiError`]. The typed
//! surface lives in [`service`].

mod error;
pub mod service;
pub mod types;

pub use error::ApiError;

use std::sync::Arc;

use futures::StreamExt;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::session::{self, SessionContext};
use types::SessionStatus;

/// Phases of a request's lifecycle, reported to an optional sink.
///
/// `Upload` and `Download` carry a completed fraction in `0.0..=1.0`.
/// Upload progress is coarse (reported once the request body has been handed
/// to the transport); download progress is fractional while the response
/// body streams in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Started,
    Upload(f64),
    Download(f64),
    Completed,
}

pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

enum Payload {
    Json(serde_json::Value),
    Multipart(Form),
}

pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let session = Arc::new(SessionContext::new(
            config.api_url.clone(),
            config.api_key.clone(),
        ));
        let http = reqwest::Client::builder()
            .cookie_provider(session.cookie_jar())
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        if endpoint.starts_with("https://") {
            Ok(Url::parse(endpoint)?)
        } else {
            Ok(self.config.api_url.join(&format!("api/{endpoint}"))?)
        }
    }

    /// Resolve a usable access key: the configured key when valid, else the
    /// cookie-sourced one, refreshing session cookies when it has expired.
    /// With no key from either place the resolution fails without touching
    /// the network; `None` means the caller must not attempt an
    /// authenticated call.
    pub async fn resolve_access_key(&self, cookie_only: bool) -> Option<String> {
        if !cookie_only {
            if let Some(key) = self.session.configured_key() {
                return Some(key);
            }
        }
        match self.session.cookie_access_key() {
            Some(key) if !session::is_key_expired(&key) => Some(key),
            Some(_) => {
                if let Err(err) = self.status().await {
                    tracing::debug!("cookie refresh failed: {err}");
                }
                self.session.cookie_access_key()
            }
            None => None,
        }
    }

    async fn xsrf_token(&self) -> Option<String> {
        match self.session.cookie_xsrf_token() {
            Some(token) => Some(token),
            None => {
                if let Err(err) = self.status().await {
                    tracing::debug!("cookie refresh failed: {err}");
                }
                self.session.cookie_xsrf_token()
            }
        }
    }

    /// The unauthenticated bootstrap call. Returns session metadata and, as
    /// a side effect, refreshes the session cookies in the shared jar.
    pub async fn status(&self) -> Result<SessionStatus, ApiError> {
        let url = self.config.api_url.join("api/forgevtt")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let metadata: SessionStatus = decode_envelope(status, &body)?;
        self.session.record_status(metadata.clone());
        Ok(metadata)
    }

    /// JSON POST to an authenticated endpoint.
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        self.request(endpoint, Payload::Json(serde_json::to_value(body)?), None)
            .await
    }

    /// Multipart POST to an authenticated endpoint, with optional progress.
    pub async fn post_form<R>(
        &self,
        endpoint: &str,
        form: Form,
        progress: Option<ProgressSink>,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        self.request(endpoint, Payload::Multipart(form), progress)
            .await
    }

    async fn request<R>(
        &self,
        endpoint: &str,
        payload: Payload,
        progress: Option<ProgressSink>,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        // Fail fast: no usable key means no network call.
        let key = self.resolve_access_key(false).await.ok_or(ApiError::Auth)?;
        let url = self.endpoint_url(endpoint)?;

        let mut request = match payload {
            Payload::Json(value) => self.http.post(url).json(&value),
            Payload::Multipart(form) => self.http.post(url).multipart(form),
        };
        request = request.header("Access-Key", key);
        if let Some(token) = self.xsrf_token().await {
            request = request.header("X-XSRF-TOKEN", token);
        }

        if let Some(sink) = &progress {
            sink(Progress::Started);
        }
        let response = request.send().await?;
        if let Some(sink) = &progress {
            sink(Progress::Upload(1.0));
        }

        let status = response.status();
        let total = response.content_length();
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            body.extend_from_slice(&chunk);
            if let (Some(sink), Some(total)) = (&progress, total) {
                if total > 0 {
                    sink(Progress::Download(body.len() as f64 / total as f64));
                }
            }
        }
        if let Some(sink) = &progress {
            sink(Progress::Completed);
        }

        decode_envelope(status, &body)
    }
}

/// Decode a response body, surfacing a server-reported `{code, error}`
/// envelope as [`ApiError::Service`] before attempting the typed decode.
fn decode_envelope<R>(status: StatusCode, body: &[u8]) -> Result<R, ApiError>
where
    R: DeserializeOwned,
{
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            if !status.is_success() {
                return Err(ApiError::HttpStatus(
                    status.as_u16(),
                    String::from_utf8_lossy(body).into_owned(),
                ));
            }
            return Err(ApiError::Decode(err));
        }
    };
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let code = value
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or_else(|| status.as_u16());
        let message = error
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Err(ApiError::Service { code, message });
    }
    Ok(serde_json::from_value(value)?)
}
