use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::cache::{CachedPair, GeocodeCache};
use crate::config::AppConfig;
use crate::errors::ResolverResult;
use crate::normalize::{to_canonical_label, translate_script_hints};
use crate::resolver::{Resolution, NOT_FOUND};

const MIN_QUERY_CHARS: usize = 3;

/// Address-component keys tried in priority order. District-like fields
/// first, broader administrative fields as fallback.
const DISTRICT_COMPONENT_KEYS: &[&str] = &["state_district", "district", "county", "state"];
/// Thana-equivalent keys, narrowest first.
const THANA_COMPONENT_KEYS: &[&str] = &[
    "suburb",
    "neighbourhood",
    "city_district",
    "municipality",
    "borough",
    "town",
    "city",
    "village",
    "police",
];

/// One structured geocoder result: the `address` sub-object whose keys vary
/// by locality type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodeHit {
    #[serde(default)]
    address: HashMap<String, String>,
}

impl GeocodeHit {
    pub fn new(address: HashMap<String, String>) -> Self {
        Self { address }
    }

    fn component(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.address.get(*key))
            .map(String::as_str)
            .find(|value| !value.trim().is_empty())
    }
}

/// Seam for the external geocoding service, mirrored by test doubles.
#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    /// One request for one free-text query; at most one structured result.
    async fn lookup(&self, query: &str) -> ResolverResult<Option<GeocodeHit>>;
}

/// HTTP client for the Nominatim search endpoint, scoped to one country.
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
    country_code: String,
}

impl NominatimClient {
    pub fn new(config: &AppConfig) -> ResolverResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.geocoder_user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.geocoder_endpoint.clone(),
            country_code: config.country_code.clone(),
        })
    }
}

#[async_trait]
impl GeocodeLookup for NominatimClient {
    async fn lookup(&self, query: &str) -> ResolverResult<Option<GeocodeHit>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("addressdetails", "1"),
                ("countrycodes", self.country_code.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "geocoder returned non-success status");
            return Ok(None);
        }

        let mut hits: Vec<GeocodeHit> = response.json().await?;
        if hits.is_empty() {
            Ok(None)
        } else {
            Ok(Some(hits.remove(0)))
        }
    }
}

/// Enforces a minimum interval between geocoder requests. The service's
/// usage policy expects a bounded, low request rate.
struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

/// Resolves one raw address through the external geocoder, falling through
/// phrasing variants until one returns a result. Every outcome, including a
/// full miss, is written through to the cache before returning.
pub struct OnlineResolver {
    lookup: Arc<dyn GeocodeLookup>,
    limiter: RateLimiter,
    country_suffix: String,
}

impl OnlineResolver {
    pub fn new(config: &AppConfig) -> ResolverResult<Self> {
        let client = NominatimClient::new(config)?;
        Ok(Self::with_lookup(Arc::new(client), config))
    }

    pub fn with_lookup(lookup: Arc<dyn GeocodeLookup>, config: &AppConfig) -> Self {
        Self {
            lookup,
            limiter: RateLimiter::new(config.request_delay),
            country_suffix: config.country_suffix.clone(),
        }
    }

    pub async fn resolve(&self, raw: &str, cache: &mut GeocodeCache) -> Resolution {
        if let Some(cached) = cache.get(raw) {
            return Resolution::from_cached(cached);
        }

        let resolved = self.query_variants(raw).await;
        let pair = CachedPair {
            district: resolved
                .district
                .clone()
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            thana: resolved
                .thana
                .clone()
                .unwrap_or_else(|| NOT_FOUND.to_string()),
        };
        cache.put(raw, pair.district, pair.thana);
        resolved
    }

    async fn query_variants(&self, raw: &str) -> Resolution {
        for query in query_attempts(raw, &self.country_suffix) {
            self.limiter.wait().await;
            match self.lookup.lookup(&query).await {
                Ok(Some(hit)) => {
                    debug!(%query, "geocoder returned a result");
                    return Resolution {
                        district: hit.component(DISTRICT_COMPONENT_KEYS).map(to_canonical_label),
                        thana: hit.component(THANA_COMPONENT_KEYS).map(to_canonical_label),
                    };
                }
                Ok(None) => {
                    debug!(%query, "geocoder attempt returned nothing");
                }
                Err(err) => {
                    warn!(?err, %query, "geocoder attempt failed");
                }
            }
        }
        Resolution::default()
    }
}

/// Ordered query phrasings for one raw address: verbatim, script-hint
/// translated, country-suffixed, and de-comma'd with the country suffix.
/// Too-short and duplicate phrasings are dropped.
fn query_attempts(raw: &str, country_suffix: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let translated = translate_script_hints(trimmed);
    let suffixed = if trimmed
        .to_lowercase()
        .contains(&country_suffix.to_lowercase())
    {
        trimmed.to_string()
    } else {
        format!("{trimmed}, {country_suffix}")
    };
    let decommaed = format!(
        "{}, {}",
        collapse_whitespace(&trimmed.replace(',', " ")),
        country_suffix
    );

    let mut attempts = Vec::new();
    for candidate in [trimmed.to_string(), translated, suffixed, decommaed] {
        let candidate = candidate.trim().to_string();
        if candidate.chars().count() < MIN_QUERY_CHARS {
            continue;
        }
        if !attempts.contains(&candidate) {
            attempts.push(candidate);
        }
    }
    attempts
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Test double for the geocoder seam, shared with the orchestrator tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub(crate) struct ScriptedLookup {
        responses: Mutex<Vec<ResolverResult<Option<GeocodeHit>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLookup {
        pub(crate) fn new(mut responses: Vec<ResolverResult<Option<GeocodeHit>>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodeLookup for ScriptedLookup {
        async fn lookup(&self, _query: &str) -> ResolverResult<Option<GeocodeHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().pop().unwrap_or(Ok(None))
        }
    }

    pub(crate) fn hit(components: &[(&str, &str)]) -> GeocodeHit {
        GeocodeHit::new(
            components
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
