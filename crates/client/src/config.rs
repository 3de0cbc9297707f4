use std::time::Duration;

use url::Url;

/// Client configuration.
///
/// Defaults point at the public service; a self-hosted deployment overrides
/// `api_url` and `assets_prefix` together since asset URLs are minted under
/// the assets host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API host. Endpoints resolve under `<api_url>/api/`.
    pub api_url: Url,
    /// URL prefix of the assets library CDN. Any browse target carrying this
    /// prefix is routed to the user's library regardless of stated source.
    pub assets_prefix: String,
    /// Explicitly configured access key. When absent (or expired), keys are
    /// resolved from session cookies instead.
    pub api_key: Option<String>,
    /// Whether we are running inside the hosted deployment. Enables the
    /// catalog-first browse heuristic for package-relative paths.
    pub hosted: bool,
    /// Endpoint for raw byte transfer. Either an absolute URL (dedicated
    /// upload host) or an endpoint name resolved under `<api_url>/api/`.
    pub upload_endpoint: String,
    /// Slug of the active game, attached to browse calls for scoping.
    pub game_slug: Option<String>,
    /// Transport timeout for API calls.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("https://forge-vtt.com").expect("static url"),
            assets_prefix: "https://assets.forge-vtt.com/".to_string(),
            api_key: None,
            upload_endpoint: "https://upload.forge-vtt.com".to_string(),
            hosted: false,
            game_slug: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ClientConfig {
    /// Derive the assets prefix for a custom hostname, e.g. a staging
    /// deployment at `forge.example.com` serves assets from
    /// `assets.forge.example.com`. Rejects hostnames that do not form a
    /// valid URL rather than silently keeping the defaults.
    pub fn with_hostname(mut self, hostname: &str) -> Result<Self, url::ParseError> {
        self.api_url = Url::parse(&format!("https://{hostname}"))?;
        self.assets_prefix = format!("https://assets.{hostname}/");
        self.upload_endpoint = format!("https://upload.{hostname}");
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hostname_derives_service_hosts() {
        let config = ClientConfig::default()
            .with_hostname("forge.example.com")
            .unwrap();
        assert_eq!(config.api_url.as_str(), "https://forge.example.com/");
        assert_eq!(config.assets_prefix, "https://assets.forge.example.com/");
        assert_eq!(config.upload_endpoint, "https://upload.forge.example.com");
    }

    #[test]
    fn test_with_hostname_rejects_invalid_hostname() {
        assert!(ClientConfig::default().with_hostname("not a host").is_err());
    }
}
