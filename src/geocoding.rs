//! HTTP geocoder for depot addresses.
//!
//! Free-text lookup against a HERE-style `/v1/geocode` endpoint, restricted
//! to one country and optionally biased toward a point. Any failure
//! (missing key, network, non-success status, empty result) yields `None`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::depot::{GeocodeResult, Geocoder};
use crate::domain::Coord;

/// Default geocoding endpoint.
pub const DEFAULT_GEOCODE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";

/// How long a geocoded address is remembered.
pub const GEOCODE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    items: Vec<GeocodeItem>,
}

#[derive(Debug, Deserialize)]
struct GeocodeItem {
    #[serde(default)]
    access: Vec<Position>,
    #[serde(default)]
    route: Vec<Position>,
    position: Option<Position>,
    address: Option<ItemAddress>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Position {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ItemAddress {
    label: Option<String>,
}

/// Replaces typographic quotes with plain ones and trims whitespace.
///
/// ```
/// use route_optimizer::geocoding::normalize_address;
///
/// assert_eq!(normalize_address("  \u{201C}O\u{2019}Connor St\u{201D} "), "\"O'Connor St\"");
/// ```
pub fn normalize_address(address: &str) -> String {
    address
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Picks the best point of the first item: access point, then routing point, then display position.
fn pick_result(response: GeocodeResponse, query: &str) -> Option<GeocodeResult> {
    let item = response.items.into_iter().next()?;
    let best = item
        .access
        .first()
        .or_else(|| item.route.first())
        .or(item.position.as_ref())
        .copied()?;

    if !Coord::new(best.lat, best.lng).is_valid() {
        return None;
    }

    Some(GeocodeResult {
        lat: best.lat,
        lng: best.lng,
        label: Some(
            item.address
                .and_then(|a| a.label)
                .unwrap_or_else(|| query.to_string()),
        ),
    })
}

/// Geocoder backed by the HERE geocoding REST API.
pub struct HereGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    country_code: String,
}

impl HereGeocoder {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("route-optimizer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            country_code: "CAN".to_string(),
        })
    }

    /// ISO 3166 alpha-3 country the search is restricted to.
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = code.into();
        self
    }

    async fn lookup(&self, query: &str, api_key: &str, bias: Option<Coord>) -> Result<Option<GeocodeResult>, reqwest::Error> {
        let mut params = vec![
            ("q", query.to_string()),
            ("apiKey", api_key.to_string()),
            ("in", format!("countryCode:{}", self.country_code)),
        ];
        if let Some(at) = bias {
            params.push(("at", format!("{},{}", at.lat, at.lng)));
        }

        let response = self.client.get(&self.url).query(&params).send().await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Geocoding request failed");
            return Ok(None);
        }

        let body: GeocodeResponse = response.json().await?;
        Ok(pick_result(body, query))
    }
}

impl Geocoder for HereGeocoder {
    async fn geocode(&self, address: &str, bias: Option<Coord>) -> Option<GeocodeResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("No geocoding API key configured");
            return None;
        };
        let query = normalize_address(address);
        if query.is_empty() {
            return None;
        }

        match self.lookup(&query, api_key, bias).await {
            Ok(Some(result)) => {
                debug!(query = %query, lat = result.lat, lng = result.lng, "Geocoded address");
                Some(result)
            }
            Ok(None) => {
                warn!(query = %query, "No geocoding results");
                None
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Geocoding error");
                None
            }
        }
    }
}

/// Wraps a geocoder with a TTL cache of successful lookups keyed by normalized address.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Arc<dyn Cache<String, GeocodeResult>>,
    ttl: Duration,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: Arc<dyn Cache<String, GeocodeResult>>) -> Self {
        Self {
            inner,
            cache,
            ttl: GEOCODE_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    async fn geocode(&self, address: &str, bias: Option<Coord>) -> Option<GeocodeResult> {
        let key = normalize_address(address).to_lowercase();
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }
        let result = self.inner.geocode(address, bias).await?;
        self.cache.insert(key, result.clone(), self.ttl);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::depot::tests::MapGeocoder;

    fn parse(json: &str) -> GeocodeResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_prefers_access_point() {
        let body = parse(
            r#"{"items":[{
                "position":{"lat":45.1,"lng":-75.1},
                "access":[{"lat":45.2,"lng":-75.2}],
                "route":[{"lat":45.3,"lng":-75.3}],
                "address":{"label":"1 Main St, Ottawa"}
            }]}"#,
        );
        let result = pick_result(body, "1 main").unwrap();
        assert_eq!((result.lat, result.lng), (45.2, -75.2));
        assert_eq!(result.label.as_deref(), Some("1 Main St, Ottawa"));
    }

    #[test]
    fn test_falls_back_to_route_then_position() {
        let route = parse(r#"{"items":[{"position":{"lat":45.1,"lng":-75.1},"route":[{"lat":45.3,"lng":-75.3}]}]}"#);
        assert_eq!(pick_result(route, "q").unwrap().lat, 45.3);

        let position = parse(r#"{"items":[{"position":{"lat":45.1,"lng":-75.1}}]}"#);
        let result = pick_result(position, "q").unwrap();
        assert_eq!(result.lat, 45.1);
        assert_eq!(result.label.as_deref(), Some("q"));
    }

    #[test]
    fn test_empty_or_invalid_items() {
        assert!(pick_result(parse(r#"{"items":[]}"#), "q").is_none());
        assert!(pick_result(parse(r#"{}"#), "q").is_none());
        assert!(pick_result(parse(r#"{"items":[{"position":{"lat":99.0,"lng":0.0}}]}"#), "q").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_returns_none() {
        let geocoder = HereGeocoder::new(DEFAULT_GEOCODE_URL, None).unwrap();
        assert!(geocoder.geocode("1 Main St", None).await.is_none());
    }

    #[tokio::test]
    async fn test_cached_geocoder_reuses_hits() {
        let cache: Arc<dyn Cache<String, GeocodeResult>> = Arc::new(TtlCache::new());
        let geocoder = CachedGeocoder::new(MapGeocoder::with("Depot", 45.0, -75.0), cache);

        assert!(geocoder.geocode("Depot", None).await.is_some());
        assert!(geocoder.geocode(" depot ", None).await.is_some());
        assert_eq!(geocoder.inner.calls.lock().len(), 1);

        assert!(geocoder.geocode("Elsewhere", None).await.is_none());
        assert_eq!(geocoder.inner.calls.lock().len(), 2);
    }
}
