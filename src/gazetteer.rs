use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::normalize::normalize;

/// The administrative districts of Bangladesh, in scan order.
pub(crate) const DISTRICTS: &[&str] = &[
    "dhaka",
    "gazipur",
    "narayanganj",
    "munshiganj",
    "manikganj",
    "narshingdi",
    "kishoreganj",
    "tangail",
    "mymensingh",
    "jamalpur",
    "netrokona",
    "sherpur",
    "faridpur",
    "madaripur",
    "gopalganj",
    "rajbari",
    "shariatpur",
    "chattogram",
    "cox s bazar",
    "feni",
    "noakhali",
    "lakshmipur",
    "rangamati",
    "khagrachhari",
    "bandarban",
    "comilla",
    "brahmanbaria",
    "sylhet",
    "moulvibazar",
    "habiganj",
    "sunamganj",
    "khulna",
    "jashore",
    "satkhira",
    "bagerhat",
    "chuadanga",
    "kushtia",
    "meherpur",
    "jhenaidah",
    "magura",
    "narail",
    "rajshahi",
    "chapainawabganj",
    "naogaon",
    "natore",
    "pabna",
    "sirajganj",
    "bogura",
    "barishal",
    "patuakhali",
    "barguna",
    "jhalokathi",
    "pirojpur",
    "bhola",
    "rangpur",
    "dinajpur",
    "nilphamari",
    "lalmonirhat",
    "kurigram",
    "gaibandha",
    "thakurgaon",
    "panchagarh",
];

/// Known alias spellings, resolving to a canonical district name.
pub(crate) const DISTRICT_ALIASES: &[(&str, &str)] = &[
    ("laxmipur", "lakshmipur"),
    ("bogra", "bogura"),
    ("jessore", "jashore"),
    ("barisal", "barishal"),
    ("chittagong", "chattogram"),
    ("coxsbazar", "cox s bazar"),
    ("cox's bazar", "cox s bazar"),
];

/// Well-known city sub-areas mapped to their district. Seed for the index.
const AREA_TO_DISTRICT: &[(&str, &str)] = &[
    // Dhaka city
    ("gulshan", "dhaka"),
    ("banani", "dhaka"),
    ("baridhara", "dhaka"),
    ("badda", "dhaka"),
    ("uttara", "dhaka"),
    ("mirpur", "dhaka"),
    ("mohammadpur", "dhaka"),
    ("tejgaon", "dhaka"),
    ("dhanmondi", "dhaka"),
    ("lalbagh", "dhaka"),
    ("kafrul", "dhaka"),
    ("cantonment", "dhaka"),
    ("airport", "dhaka"),
    ("ramna", "dhaka"),
    ("motijheel", "dhaka"),
    ("paltan", "dhaka"),
    ("sabujbagh", "dhaka"),
    ("khilgaon", "dhaka"),
    ("rampura", "dhaka"),
    ("jatrabari", "dhaka"),
    ("mugda", "dhaka"),
    ("wari", "dhaka"),
    ("demra", "dhaka"),
    ("shyampur", "dhaka"),
    ("kamrangirchar", "dhaka"),
    ("adabor", "dhaka"),
    ("hazaribagh", "dhaka"),
    ("shahbag", "dhaka"),
    ("banglamotor", "dhaka"),
    ("bansree", "dhaka"),
    ("khilkhet", "dhaka"),
    ("bosila", "dhaka"),
    ("niketan", "dhaka"),
    ("notun bazar", "dhaka"),
    ("bashundhara", "dhaka"),
    ("bashundhara r/a", "dhaka"),
    ("nakhalpara", "dhaka"),
    ("tejgaon industrial area", "dhaka"),
    ("zigatola", "dhaka"),
    // Gazipur
    ("tongi", "gazipur"),
    ("joydebpur", "gazipur"),
    ("kaliakair", "gazipur"),
    ("kaliganj", "gazipur"),
    ("sreepur", "gazipur"),
    // Narayanganj
    ("siddhirganj", "narayanganj"),
    ("bandar", "narayanganj"),
    ("fatulla", "narayanganj"),
    // Chattogram
    ("kotwali", "chattogram"),
    ("panchlaish", "chattogram"),
    ("double mooring", "chattogram"),
    ("pahartali", "chattogram"),
    ("halishahar", "chattogram"),
    ("patenga", "chattogram"),
    ("bakalia", "chattogram"),
    ("bandar thana", "chattogram"),
    ("chandgaon", "chattogram"),
    ("akbar shah", "chattogram"),
    ("bayazid", "chattogram"),
    // Sylhet
    ("kotwali sylhet", "sylhet"),
    ("south surma", "sylhet"),
    ("moglabazar", "sylhet"),
    ("subidbazar", "sylhet"),
    // Rajshahi
    ("boalia", "rajshahi"),
    ("motihar", "rajshahi"),
    ("rajpara", "rajshahi"),
    ("shah makhdum", "rajshahi"),
    // Khulna
    ("khalishpur", "khulna"),
    ("daulatpur", "khulna"),
    ("sonadanga", "khulna"),
    ("khulna kotwali", "khulna"),
    // Barishal
    ("barishal kotwali", "barishal"),
    ("airport barishal", "barishal"),
    // Comilla
    ("kotwali comilla", "comilla"),
    ("adarsa sadar", "comilla"),
    // Others
    ("sadar noakhali", "noakhali"),
    ("sadar bogura", "bogura"),
];

const AREA_HEADERS: &[&str] = &["thana", "upazila", "area"];
const DISTRICT_HEADERS: &[&str] = &["district", "zila"];

/// Normalized (key, canonical) district pairs used by the exact scan:
/// canonical names in declaration order, then aliases.
pub(crate) fn district_candidates() -> &'static [(String, String)] {
    static CANDIDATES: Lazy<Vec<(String, String)>> = Lazy::new(|| {
        let mut list: Vec<(String, String)> = DISTRICTS
            .iter()
            .map(|name| (normalize(name), normalize(name)))
            .collect();
        for (alias, canonical) in DISTRICT_ALIASES {
            list.push((normalize(alias), normalize(canonical)));
        }
        list
    });
    &CANDIDATES
}

/// Normalized canonical district names, fuzzy-match candidate set.
pub(crate) fn district_names() -> &'static [String] {
    static NAMES: Lazy<Vec<String>> =
        Lazy::new(|| DISTRICTS.iter().map(|name| normalize(name)).collect());
    &NAMES
}

/// In-memory mapping from normalized area/thana names to their district.
/// Built from the seed table (with mechanically derived key variants) and
/// optionally overlaid with an external CSV table; external entries win on
/// key collision.
#[derive(Debug, Clone)]
pub struct GazetteerIndex {
    entries: HashMap<String, String>,
    scan_keys: Vec<String>,
}

impl GazetteerIndex {
    pub fn seed() -> Self {
        let mut entries = HashMap::new();
        for (key, district) in AREA_TO_DISTRICT {
            let district = normalize(district);
            let variants = [
                key.to_string(),
                key.replace('-', " "),
                key.replace(' ', ""),
                key.replace('/', " "),
            ];
            for variant in variants {
                let normalized = normalize(&variant);
                if !normalized.is_empty() {
                    entries.insert(normalized, district.clone());
                }
            }
        }
        let mut index = Self {
            entries,
            scan_keys: Vec::new(),
        };
        index.rebuild_scan_keys();
        index
    }

    /// Seed index plus the external table at `path`. A missing or unreadable
    /// table degrades to the seed-only build.
    pub fn from_csv_path(path: &Path) -> Self {
        let mut index = Self::seed();
        match File::open(path) {
            Ok(file) => index.overlay(file),
            Err(err) => warn!(
                ?err,
                path = %path.display(),
                "gazetteer table unavailable; using seed only"
            ),
        }
        index
    }

    /// Overlays (area, district) rows parsed from `reader`. Column headers
    /// are matched case-insensitively against a small synonym set; when no
    /// header matches, columns 0 and 1 are used. Rows that normalize to an
    /// empty field are skipped. Parse failures never surface to the caller.
    pub fn overlay<R: Read>(&mut self, reader: R) {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let (area_idx, district_idx) = match reader.headers() {
            Ok(headers) => detect_columns(headers),
            Err(err) => {
                warn!(?err, "gazetteer table has no readable header; using seed only");
                return;
            }
        };

        let mut loaded = 0usize;
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    trace!(?err, "skipping malformed gazetteer row");
                    continue;
                }
            };
            let area = normalize(record.get(area_idx).unwrap_or(""));
            let district = normalize(record.get(district_idx).unwrap_or(""));
            if area.is_empty() || district.is_empty() {
                continue;
            }
            self.entries.insert(area, district);
            loaded += 1;
        }
        debug!(loaded, "gazetteer table overlaid on seed");
        self.rebuild_scan_keys();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Keys in deterministic scan order: longest first so the most specific
    /// area wins the substring scan, then lexicographic.
    pub fn scan_keys(&self) -> &[String] {
        &self.scan_keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rebuild_scan_keys(&mut self) {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.scan_keys = keys;
    }
}

fn detect_columns(headers: &csv::StringRecord) -> (usize, usize) {
    let find = |candidates: &[&str]| {
        headers.iter().position(|header| {
            let header = header.trim().to_lowercase();
            candidates.contains(&header.as_str())
        })
    };
    let area_idx = find(AREA_HEADERS);
    let district_idx = find(DISTRICT_HEADERS);
    match (area_idx, district_idx) {
        (Some(area), Some(district)) => (area, district),
        _ => (0, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_maps_city_areas_to_districts() {
        let index = GazetteerIndex::seed();
        assert_eq!(index.get("gulshan"), Some("dhaka"));
        assert_eq!(index.get("kotwali"), Some("chattogram"));
        assert_eq!(index.get("tongi"), Some("gazipur"));
        assert!(index.get("atlantis").is_none());
    }

    #[test]
    fn seed_registers_mechanical_key_variants() {
        let index = GazetteerIndex::seed();
        // slash key, slash-to-space variant, and space-stripped variant
        assert_eq!(index.get("bashundhara r/a"), Some("dhaka"));
        assert_eq!(index.get("bashundhara r a"), Some("dhaka"));
        assert_eq!(index.get("notunbazar"), Some("dhaka"));
    }

    #[test]
    fn overlay_prefers_external_entries_on_collision() {
        let mut index = GazetteerIndex::seed();
        index.overlay("thana,district\nGulshan,Gazipur\nSadar,Kushtia\n".as_bytes());
        assert_eq!(index.get("gulshan"), Some("gazipur"));
        assert_eq!(index.get("sadar"), Some("kushtia"));
    }

    #[test]
    fn overlay_accepts_header_synonyms() {
        let mut index = GazetteerIndex::seed();
        index.overlay("District,Upazila\nKushtia,Sadar\n".as_bytes());
        assert_eq!(index.get("sadar"), Some("kushtia"));
    }

    #[test]
    fn overlay_falls_back_to_column_position() {
        let mut index = GazetteerIndex::seed();
        index.overlay("name,label\nSavar,Dhaka\n".as_bytes());
        assert_eq!(index.get("savar"), Some("dhaka"));
    }

    #[test]
    fn overlay_skips_rows_with_empty_fields() {
        let mut index = GazetteerIndex::seed();
        let before = index.len();
        index.overlay("thana,district\n,Dhaka\nSavar,\n!!!,???\n".as_bytes());
        assert_eq!(index.len(), before);
    }

    #[test]
    fn overlay_fails_softly_on_garbage() {
        let mut index = GazetteerIndex::seed();
        let before = index.len();
        index.overlay(&b"\xff\xfe\x00garbage"[..]);
        assert_eq!(index.len(), before);
        assert_eq!(index.get("gulshan"), Some("dhaka"));
    }

    #[test]
    fn scan_keys_order_longest_first() {
        let index = GazetteerIndex::seed();
        let keys = index.scan_keys();
        for pair in keys.windows(2) {
            assert!(pair[0].len() >= pair[1].len());
        }
        let kotwali_sylhet = keys.iter().position(|k| k == "kotwali sylhet").unwrap();
        let kotwali = keys.iter().position(|k| k == "kotwali").unwrap();
        assert!(kotwali_sylhet < kotwali);
    }
}
