//! Credentials for the tour-planning service.
//!
//! Two modes are supported: a static API key sent as the `apiKey` query
//! parameter (never in a header), or an OAuth 2.0 bearer token obtained
//! with the client-credentials grant. Tokens live in an injected
//! [`Cache`] and are refreshed a minute before they expire.

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::{AuthMode, SolverEndpointConfig};
use crate::error::SolverError;

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://account.api.here.com/oauth2/token";

/// Tokens are dropped from the cache this long before the server says they expire.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

const TOKEN_CACHE_KEY: &str = "tour-planning-token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// How long a token may be served from cache.
///
/// ```
/// use route_optimizer::auth::token_cache_ttl;
/// use std::time::Duration;
///
/// assert_eq!(token_cache_ttl(Some(3600)), Duration::from_secs(3540));
/// assert_eq!(token_cache_ttl(None), Duration::from_secs(3540));
/// assert_eq!(token_cache_ttl(Some(30)), Duration::ZERO);
/// ```
pub fn token_cache_ttl(expires_in: Option<u64>) -> Duration {
    let lifetime = Duration::from_secs(expires_in.filter(|&s| s > 0).unwrap_or(DEFAULT_EXPIRES_IN_SECS));
    lifetime.saturating_sub(TOKEN_REFRESH_MARGIN)
}

/// Client-credentials settings.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub token_url: String,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
}

/// Fetches and caches OAuth bearer tokens.
pub struct TokenProvider {
    client: reqwest::Client,
    settings: OAuthSettings,
    cache: Arc<dyn Cache<String, String>>,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, settings: OAuthSettings, cache: Arc<dyn Cache<String, String>>) -> Self {
        Self {
            client,
            settings,
            cache,
        }
    }

    /// Returns a live token, requesting a new one when the cached token is gone.
    pub async fn token(&self) -> Result<String, SolverError> {
        let key = TOKEN_CACHE_KEY.to_string();
        if let Some(token) = self.cache.get(&key) {
            debug!("Using cached OAuth token");
            return Ok(token);
        }

        let (Some(id), Some(secret)) = (
            self.settings.access_key_id.as_deref(),
            self.settings.access_key_secret.as_deref(),
        ) else {
            return Err(SolverError::Auth("OAuth credentials not configured".to_string()));
        };

        info!(url = %self.settings.token_url, "Requesting OAuth token");
        let response = self
            .client
            .post(&self.settings.token_url)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SolverError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SolverError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SolverError::Auth(format!("malformed token response: {}", e)))?;

        let ttl = token_cache_ttl(token.expires_in);
        self.cache.insert(key, token.access_token.clone(), ttl);
        info!(ttl_secs = ttl.as_secs(), "OAuth token obtained");
        Ok(token.access_token)
    }
}

/// Credentials attached to every tour-planning request.
pub enum Credentials {
    /// Static key, sent as the `apiKey` query parameter.
    ApiKey(String),
    /// Bearer token from the OAuth token endpoint.
    OAuth(TokenProvider),
    /// Nothing configured; every request fails with [`SolverError::Auth`].
    Missing,
}

impl Credentials {
    /// Credentials for the configured auth mode.
    ///
    /// API-key mode without a key yields [`Credentials::Missing`]; OAuth
    /// mode always yields a provider, which reports missing keys on first use.
    pub fn from_endpoint(
        config: &SolverEndpointConfig,
        client: reqwest::Client,
        cache: Arc<dyn Cache<String, String>>,
    ) -> Self {
        match config.auth_mode {
            AuthMode::ApiKey => match &config.api_key {
                Some(key) => Credentials::ApiKey(key.clone()),
                None => {
                    warn!("No tour-planning API key configured; remote solves will fall back");
                    Credentials::Missing
                }
            },
            AuthMode::OAuth => Credentials::OAuth(TokenProvider::new(
                client,
                OAuthSettings {
                    token_url: config.token_url.clone(),
                    access_key_id: config.access_key_id.clone(),
                    access_key_secret: config.access_key_secret.clone(),
                },
                cache,
            )),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::ApiKey(_) => "apikey",
            Credentials::OAuth(_) => "oauth",
            Credentials::Missing => "none",
        }
    }

    /// Adds the credentials to a request.
    pub async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder, SolverError> {
        match self {
            Credentials::ApiKey(key) => Ok(request.query(&[("apiKey", key.as_str())])),
            Credentials::OAuth(provider) => {
                let token = provider.token().await?;
                Ok(request.bearer_auth(token))
            }
            Credentials::Missing => Err(SolverError::Auth(
                "no API key or OAuth credentials configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;

    fn provider(cache: Arc<dyn Cache<String, String>>, id: Option<&str>) -> TokenProvider {
        TokenProvider::new(
            reqwest::Client::new(),
            OAuthSettings {
                token_url: "http://127.0.0.1:9/oauth2/token".to_string(),
                access_key_id: id.map(str::to_string),
                access_key_secret: id.map(|_| "secret".to_string()),
            },
            cache,
        )
    }

    #[tokio::test]
    async fn test_cached_token_served_without_request() {
        let cache: Arc<dyn Cache<String, String>> = Arc::new(TtlCache::new());
        cache.insert(TOKEN_CACHE_KEY.to_string(), "cached".to_string(), Duration::from_secs(60));
        let provider = provider(cache, Some("id"));
        assert_eq!(provider.token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_missing_oauth_credentials() {
        let provider = provider(Arc::new(TtlCache::new()), None);
        assert!(matches!(provider.token().await, Err(SolverError::Auth(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_apply() {
        let request = reqwest::Client::new().get("http://localhost/problems");
        assert!(matches!(Credentials::Missing.apply(request).await, Err(SolverError::Auth(_))));
    }

    #[tokio::test]
    async fn test_api_key_goes_in_query() {
        let client = reqwest::Client::new();
        let request = Credentials::ApiKey("k3y".to_string())
            .apply(client.get("http://localhost/v3/problems"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("apiKey=k3y"));
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_credentials_from_endpoint() {
        let mut config = SolverEndpointConfig::from_lookup(|_| None).unwrap();
        let cache = || -> Arc<dyn Cache<String, String>> { Arc::new(TtlCache::new()) };
        assert_eq!(Credentials::from_endpoint(&config, reqwest::Client::new(), cache()).mode(), "none");

        config.api_key = Some("k".to_string());
        assert_eq!(Credentials::from_endpoint(&config, reqwest::Client::new(), cache()).mode(), "apikey");

        config.auth_mode = AuthMode::OAuth;
        assert_eq!(Credentials::from_endpoint(&config, reqwest::Client::new(), cache()).mode(), "oauth");
    }

    #[test]
    fn test_token_response_parses_without_expiry() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"abc","token_type":"bearer"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token_cache_ttl(token.expires_in), Duration::from_secs(3540));
    }
}
