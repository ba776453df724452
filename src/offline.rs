use strsim::normalized_levenshtein;

use crate::gazetteer::{district_candidates, district_names, GazetteerIndex};
use crate::normalize::{normalize, to_canonical_label};
use crate::resolver::Resolution;

const DISTRICT_FUZZY_THRESHOLD: f64 = 0.88;
const AREA_FUZZY_THRESHOLD: f64 = 0.90;

/// Best-effort (District, Thana) guess from a normalized address, using the
/// gazetteer index only. Deterministic and side-effect free; literal matches
/// outrank fuzzy ones, and a district named explicitly outranks one inferred
/// from an area.
pub struct OfflineResolver {
    index: GazetteerIndex,
}

impl OfflineResolver {
    pub fn new(index: GazetteerIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &GazetteerIndex {
        &self.index
    }

    pub fn resolve(&self, addr_norm: &str) -> Resolution {
        let area = self.guess_area(addr_norm);
        let district = self.guess_district(addr_norm, area.as_deref());

        let mut resolution = Resolution {
            district: district.as_deref().map(to_canonical_label),
            thana: area.as_deref().map(to_canonical_label),
        };

        // Gazetteer gram re-scan fills whichever field is still open; the
        // first hit fills and stops, a later gram never overrides it.
        if resolution.district.is_none() || resolution.thana.is_none() {
            for gram in grams(addr_norm) {
                let key = normalize(&gram);
                if let Some(district) = self.index.get(&key) {
                    if resolution.thana.is_none() {
                        resolution.thana = Some(to_canonical_label(&key));
                    }
                    if resolution.district.is_none() {
                        resolution.district = Some(to_canonical_label(district));
                    }
                    break;
                }
            }
        }

        resolution
    }

    fn guess_district(&self, addr_norm: &str, area: Option<&str>) -> Option<String> {
        for (key, canonical) in district_candidates() {
            if contains_word(addr_norm, key) {
                return Some(canonical.clone());
            }
        }
        if let Some(area) = area {
            if let Some(district) = self.index.get(area) {
                return Some(district.to_string());
            }
        }
        fuzzy_best(addr_norm, district_names().iter(), DISTRICT_FUZZY_THRESHOLD)
    }

    fn guess_area(&self, addr_norm: &str) -> Option<String> {
        for key in self.index.scan_keys() {
            if contains_word(addr_norm, key) {
                return Some(key.clone());
            }
        }
        fuzzy_best(addr_norm, self.index.scan_keys().iter(), AREA_FUZZY_THRESHOLD)
    }
}

/// Single best fuzzy candidate across all unigrams and bigrams, accepted
/// only at or above `threshold`.
fn fuzzy_best<'a>(
    addr_norm: &str,
    candidates: impl Iterator<Item = &'a String> + Clone,
    threshold: f64,
) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for gram in grams(addr_norm) {
        let gram = normalize(&gram);
        if gram.is_empty() {
            continue;
        }
        for candidate in candidates.clone() {
            let score = normalized_levenshtein(&gram, candidate);
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
    }
    best.filter(|(score, _)| *score >= threshold)
        .map(|(_, candidate)| candidate.to_string())
}

fn grams(addr_norm: &str) -> Vec<String> {
    let cleaned = addr_norm.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut grams: Vec<String> = tokens.iter().map(|token| token.to_string()).collect();
    for pair in tokens.windows(2) {
        grams.push(pair.join(" "));
    }
    grams
}

/// Word-boundary substring test: `needle` must not sit inside a longer
/// alphanumeric run. Both sides are normalized text, so byte indexing is
/// safe.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}
