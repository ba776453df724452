use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::cache::{CachedPair, GeocodeCache};
use crate::config::AppConfig;
use crate::errors::{ResolverError, ResolverResult};
use crate::gazetteer::GazetteerIndex;
use crate::normalize::{normalize, to_canonical_label};
use crate::offline::OfflineResolver;
use crate::online::OnlineResolver;

/// Canonical placeholder for an unresolved field. Part of the external
/// contract; internally absence is an `Option`.
pub const NOT_FOUND: &str = "Not found";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Offline,
    Online,
    #[default]
    Auto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Offline => "offline",
            Mode::Online => "online",
            Mode::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> ResolverResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Mode::Offline),
            "online" => Ok(Mode::Online),
            "auto" => Ok(Mode::Auto),
            _ => Err(ResolverError::Config(format!(
                "invalid resolution mode: {value}"
            ))),
        }
    }
}

/// Internal per-row result; `None` means unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub district: Option<String>,
    pub thana: Option<String>,
}

impl Resolution {
    pub(crate) fn from_cached(pair: &CachedPair) -> Self {
        let revive = |value: &str| {
            if value.trim().is_empty() || value.trim().eq_ignore_ascii_case(NOT_FOUND) {
                None
            } else {
                Some(to_canonical_label(value))
            }
        };
        Self {
            district: revive(&pair.district),
            thana: revive(&pair.thana),
        }
    }
}

/// Boundary result: one pair per input row, each field a canonical label or
/// the "Not found" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPair {
    pub district: String,
    pub thana: String,
}

impl ResolvedPair {
    /// A destination row with both fields still blank.
    pub fn blank() -> Self {
        Self {
            district: String::new(),
            thana: String::new(),
        }
    }
}

/// How a field got its value; makes the escalation order auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldStage {
    Prefilled,
    Offline,
    Online,
    Retry,
}

impl FieldStage {
    fn as_str(&self) -> &'static str {
        match self {
            FieldStage::Prefilled => "prefilled",
            FieldStage::Offline => "offline",
            FieldStage::Online => "online",
            FieldStage::Retry => "retry",
        }
    }
}

/// Per-field fill state: once a field holds a value, later stages never
/// overwrite it.
#[derive(Debug, Default)]
struct FieldTrack {
    value: Option<String>,
    resolved_by: Option<FieldStage>,
}

impl FieldTrack {
    fn prefilled(existing: &str) -> Self {
        if existing.trim().is_empty() {
            Self::default()
        } else {
            Self {
                value: Some(existing.to_string()),
                resolved_by: Some(FieldStage::Prefilled),
            }
        }
    }

    fn offer(&mut self, stage: FieldStage, candidate: Option<String>) {
        if self.value.is_some() {
            return;
        }
        if let Some(candidate) = candidate.filter(|value| !value.trim().is_empty()) {
            self.value = Some(candidate);
            self.resolved_by = Some(stage);
        }
    }

    fn is_unresolved(&self) -> bool {
        self.value.is_none()
    }

    fn stage(&self) -> &'static str {
        self.resolved_by.map(|s| s.as_str()).unwrap_or("unresolved")
    }

    fn into_label(self) -> String {
        self.value.unwrap_or_else(|| NOT_FOUND.to_string())
    }
}

/// Batch resolution options, one set per run.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub mode: Mode,
    pub gazetteer_path: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub retry_unresolved: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            gazetteer_path: None,
            cache_path: None,
            retry_unresolved: true,
        }
    }
}

/// Drives the offline and online resolvers per address row under the mode
/// policy, and exclusively owns the in-memory cache for the run.
pub struct ResolverEngine {
    offline: OfflineResolver,
    online: OnlineResolver,
    cache: GeocodeCache,
    cache_path: Option<PathBuf>,
    mode: Mode,
    retry_unresolved: bool,
}

impl ResolverEngine {
    pub fn new(config: &AppConfig, options: ResolverOptions) -> ResolverResult<Self> {
        let online = OnlineResolver::new(config)?;
        Ok(Self::assemble(online, options))
    }

    #[cfg(test)]
    pub(crate) fn with_lookup(
        lookup: std::sync::Arc<dyn crate::online::GeocodeLookup>,
        config: &AppConfig,
        options: ResolverOptions,
    ) -> Self {
        let online = OnlineResolver::with_lookup(lookup, config);
        Self::assemble(online, options)
    }

    fn assemble(online: OnlineResolver, options: ResolverOptions) -> Self {
        let index = match &options.gazetteer_path {
            Some(path) => GazetteerIndex::from_csv_path(path),
            None => GazetteerIndex::seed(),
        };
        let cache = match &options.cache_path {
            Some(path) => GeocodeCache::load(path),
            None => GeocodeCache::new(),
        };
        Self {
            offline: OfflineResolver::new(index),
            online,
            cache,
            cache_path: options.cache_path,
            mode: options.mode,
            retry_unresolved: options.retry_unresolved,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Resolves one row. Fields already populated in `existing` are final;
    /// only blank fields are filled, by whichever path the mode allows.
    pub async fn resolve_row(&mut self, raw: &str, existing: &ResolvedPair) -> ResolvedPair {
        let mut district = FieldTrack::prefilled(&existing.district);
        let mut thana = FieldTrack::prefilled(&existing.thana);
        let addr_norm = normalize(raw);

        match self.mode {
            Mode::Offline => {
                let offline = self.offline.resolve(&addr_norm);
                district.offer(FieldStage::Offline, offline.district);
                thana.offer(FieldStage::Offline, offline.thana);
            }
            Mode::Online => {
                let online = self.online.resolve(raw, &mut self.cache).await;
                district.offer(FieldStage::Online, online.district);
                thana.offer(FieldStage::Online, online.thana);
            }
            Mode::Auto => {
                let offline = self.offline.resolve(&addr_norm);
                district.offer(FieldStage::Offline, offline.district);
                thana.offer(FieldStage::Offline, offline.thana);
                if district.is_unresolved() || thana.is_unresolved() {
                    let online = self.online.resolve(raw, &mut self.cache).await;
                    district.offer(FieldStage::Online, online.district);
                    thana.offer(FieldStage::Online, online.thana);
                }
            }
        }

        // extra safety pass; skipped in online mode to avoid double-querying
        if self.retry_unresolved
            && self.mode != Mode::Online
            && (district.is_unresolved() || thana.is_unresolved())
        {
            let retry = self.online.resolve(raw, &mut self.cache).await;
            district.offer(FieldStage::Retry, retry.district);
            thana.offer(FieldStage::Retry, retry.thana);
        }

        trace!(
            address = raw,
            district_via = district.stage(),
            thana_via = thana.stage(),
            "row resolved"
        );

        ResolvedPair {
            district: district.into_label(),
            thana: thana.into_label(),
        }
    }

    /// Resolves a batch in input order, then persists the cache once. The
    /// cache is an optimization: a failed save is logged and the batch
    /// results are returned anyway.
    pub async fn resolve_batch(&mut self, addresses: &[String]) -> ResolverResult<Vec<ResolvedPair>> {
        let mut results = Vec::with_capacity(addresses.len());
        for raw in addresses {
            results.push(self.resolve_row(raw, &ResolvedPair::blank()).await);
        }
        if let Err(err) = self.persist_cache() {
            warn!(?err, "unable to persist geocode cache; keeping batch results");
        }
        Ok(results)
    }

    /// Writes the cache to its configured path; a no-op without one.
    pub fn persist_cache(&self) -> ResolverResult<()> {
        if let Some(path) = &self.cache_path {
            self.cache.save(path)?;
        }
        Ok(())
    }
}

/// One-shot entry point: build an engine for the options and resolve the
/// whole batch, order-preserving, one output pair per input address.
pub async fn resolve_batch(
    addresses: &[String],
    config: &AppConfig,
    options: ResolverOptions,
) -> ResolverResult<Vec<ResolvedPair>> {
    let mut engine = ResolverEngine::new(config, options)?;
    engine.resolve_batch(addresses).await
}
