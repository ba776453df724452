use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::ResolverResult;

const CACHE_HEADERS: [&str; 3] = ["address", "district", "thana"];

/// A resolved pair as recorded in the persistent store. Either field may be
/// the "Not found" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPair {
    pub district: String,
    pub thana: String,
}

/// Persistent lookup cache for the online resolver, keyed by the RAW address
/// string. Keys are deliberately not normalized: the cache records exactly
/// what was sent to the geocoding service, casing and punctuation included.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, CachedPair>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a persisted cache table. An absent file yields an empty cache;
    /// unparseable rows are skipped rather than failing the whole load.
    pub fn load(path: &Path) -> Self {
        let mut cache = Self::new();
        if !path.exists() {
            return cache;
        }
        let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(?err, path = %path.display(), "unable to open geocode cache; starting empty");
                return cache;
            }
        };
        let (address_idx, district_idx, thana_idx) = match reader.headers() {
            Ok(headers) => cache_columns(headers),
            Err(err) => {
                warn!(?err, "geocode cache has no readable header; starting empty");
                return cache;
            }
        };
        for record in reader.into_records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!(?err, "skipping unreadable cache row");
                    continue;
                }
            };
            let (Some(address), Some(district), Some(thana)) = (
                record.get(address_idx),
                record.get(district_idx),
                record.get(thana_idx),
            ) else {
                continue;
            };
            if address.is_empty() {
                continue;
            }
            cache.entries.insert(
                address.to_string(),
                CachedPair {
                    district: district.to_string(),
                    thana: thana.to_string(),
                },
            );
        }
        debug!(entries = cache.entries.len(), "loaded geocode cache");
        cache
    }

    /// Serializes the full cache, replacing the destination. The table is
    /// written to a sibling temp file and renamed into place so an
    /// interrupted save never truncates the previous store.
    pub fn save(&self, path: &Path) -> ResolverResult<()> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(CACHE_HEADERS)?;
            let mut keys: Vec<&String> = self.entries.keys().collect();
            keys.sort();
            for key in keys {
                let pair = &self.entries[key];
                writer.write_record([key.as_str(), pair.district.as_str(), pair.thana.as_str()])?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        debug!(entries = self.entries.len(), path = %path.display(), "saved geocode cache");
        Ok(())
    }

    pub fn get(&self, raw_address: &str) -> Option<&CachedPair> {
        self.entries.get(raw_address)
    }

    pub fn put(&mut self, raw_address: &str, district: String, thana: String) {
        self.entries
            .insert(raw_address.to_string(), CachedPair { district, thana });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Column indices for (address, district, thana), resolved by header name so
/// a reordered but correctly headed table still loads; unrecognized headers
/// fall back to column position.
fn cache_columns(headers: &csv::StringRecord) -> (usize, usize, usize) {
    let find = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
    };
    match (find("address"), find("district"), find("thana")) {
        (Some(address), Some(district), Some(thana)) => (address, district, thana),
        _ => (0, 1, 2),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn round_trips_every_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache_geocode.csv");

        let mut cache = GeocodeCache::new();
        cache.put("House 5, Gulshan, DHAKA", "Dhaka".into(), "Gulshan".into());
        cache.put("somewhere odd", "Not found".into(), "Not found".into());
        cache.put("কাঁচা বাজার, বগুড়া", "Bogura".into(), "Sadar".into());
        cache.save(&path).unwrap();

        let reloaded = GeocodeCache::load(&path);
        assert_eq!(reloaded.len(), cache.len());
        for key in [
            "House 5, Gulshan, DHAKA",
            "somewhere odd",
            "কাঁচা বাজার, বগুড়া",
        ] {
            assert_eq!(reloaded.get(key), cache.get(key), "mismatch for {key:?}");
        }
    }

    #[test]
    fn keys_are_exact_not_normalized() {
        let mut cache = GeocodeCache::new();
        cache.put("Gulshan, Dhaka", "Dhaka".into(), "Gulshan".into());
        assert!(cache.get("gulshan, dhaka").is_none());
        assert!(cache.get("Gulshan, Dhaka").is_some());
    }

    #[test]
    fn missing_file_yields_empty_cache() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::load(&dir.path().join("nope.csv"));
        assert!(cache.is_empty());
    }

    #[test]
    fn skips_unparseable_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noisy.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"address,district,thana\n").unwrap();
        file.write_all(b"good one,Dhaka,Gulshan\n").unwrap();
        file.write_all(b"broken \xff\xfe row,Dhaka,Badda\n").unwrap();
        file.write_all(b"short row\n").unwrap();
        file.write_all(b"another good,Sylhet,Kotwali\n").unwrap();
        drop(file);

        let cache = GeocodeCache::load(&path);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("good one").unwrap().district, "Dhaka");
        assert_eq!(cache.get("another good").unwrap().thana, "Kotwali");
    }

    #[test]
    fn load_resolves_columns_by_header_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reordered.csv");
        std::fs::write(&path, "district,thana,address\nDhaka,Gulshan,good one\n").unwrap();

        let cache = GeocodeCache::load(&path);
        let pair = cache.get("good one").unwrap();
        assert_eq!(pair.district, "Dhaka");
        assert_eq!(pair.thana, "Gulshan");
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let mut cache = GeocodeCache::new();
        cache.put("addr", "Not found".into(), "Not found".into());
        cache.put("addr", "Khulna".into(), "Daulatpur".into());
        assert_eq!(cache.get("addr").unwrap().district, "Khulna");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache_geocode.csv");

        let mut cache = GeocodeCache::new();
        cache.put("old", "Dhaka".into(), "Gulshan".into());
        cache.save(&path).unwrap();

        let mut cache = GeocodeCache::new();
        cache.put("new", "Sylhet".into(), "Kotwali".into());
        cache.save(&path).unwrap();

        let reloaded = GeocodeCache::load(&path);
        assert!(reloaded.get("old").is_none());
        assert_eq!(reloaded.get("new").unwrap().district, "Sylhet");
    }
}
