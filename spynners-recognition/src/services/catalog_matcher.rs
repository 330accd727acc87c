//! Catalog matching for fingerprint candidates
//!
//! Two passes:
//! 1. Direct lookup by the fingerprint service's id (authoritative, returns immediately)
//! 2. Fuzzy scoring of up to [`FUZZY_CANDIDATE_LIMIT`] catalog entries
//!
//! The weights below are calibration constants tuned against the live
//! catalog. They have no derivation beyond that and may need re-tuning.

use crate::config::MatchingConfig;
use crate::models::{CatalogEntry, CatalogMatch, MatchSource};
use crate::services::catalog_client::{CatalogError, CatalogService};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Minimum composite score for a fuzzy match to be accepted
pub const MATCH_ACCEPT_THRESHOLD: f64 = 0.45;
/// Catalog entries fetched for one fuzzy pass
pub const FUZZY_CANDIDATE_LIMIT: usize = 500;
/// Score forced when normalized titles are identical
pub const EXACT_MATCH_SCORE: f64 = 2.0;

pub const ARTIST_CONTAINS_BONUS: f64 = 0.3;
pub const ARTIST_SIMILAR_BONUS: f64 = 0.2;
pub const ARTIST_SIMILARITY_MIN: f64 = 0.5;
pub const TITLE_CONTAINS_BONUS: f64 = 0.2;
pub const WORD_OVERLAP_WEIGHT: f64 = 0.3;
pub const REMIX_BONUS: f64 = 0.15;
/// Candidate tokens must be longer than this to count towards the remix bonus
const REMIX_TOKEN_MIN_CHARS: usize = 3;

/// Strip `(…)` groups and punctuation, collapse whitespace, lowercase
///
/// A `(` without a closing `)` is kept as text (and then dropped as punctuation).
pub fn normalize(s: &str) -> String {
    let mut stripped = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                stripped.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    stripped.push_str(rest);

    let cleaned: String = stripped
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Ratcliff/Obershelp similarity in `0.0..=1.0`
///
/// `2 * M / (len_a + len_b)` where `M` is the number of characters in the
/// matching blocks found by recursively taking the longest common substring
/// (leftmost on ties) and matching the pieces on either side. Two empty
/// strings are identical.
pub fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut b_positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b_positions.entry(*c).or_default().push(j);
    }

    let mut matched = 0usize;
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(&a, &b_positions, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    2.0 * matched as f64 / total as f64
}

/// Longest common run of `a[a_lo..a_hi]` and `b[b_lo..b_hi]` as `(i, j, size)`
fn longest_match(
    a: &[char],
    b_positions: &HashMap<char, Vec<usize>>,
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0usize);
    // run length of matches ending at b[j], for the previous row of a
    let mut run_ending_at: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(a_hi).skip(a_lo) {
        let mut next_runs = HashMap::new();
        if let Some(positions) = b_positions.get(c) {
            for &j in positions {
                if j < b_lo {
                    continue;
                }
                if j >= b_hi {
                    break;
                }
                let previous = if j > 0 {
                    run_ending_at.get(&(j - 1)).copied().unwrap_or(0)
                } else {
                    0
                };
                let size = previous + 1;
                next_runs.insert(j, size);
                if size > best_size {
                    best_i = i + 1 - size;
                    best_j = j + 1 - size;
                    best_size = size;
                }
            }
        }
        run_ending_at = next_runs;
    }

    (best_i, best_j, best_size)
}

/// Candidate side of the fuzzy score, normalized once per pass
#[derive(Debug, Clone)]
pub struct MatchQuery {
    title: String,
    artist: String,
    words: HashSet<String>,
}

impl MatchQuery {
    pub fn new(title: &str, artist: &str) -> Self {
        let title = normalize(title);
        let words = title.split_whitespace().map(str::to_string).collect();
        Self {
            title,
            artist: normalize(artist),
            words,
        }
    }

    /// Composite score of one catalog entry
    pub fn score(&self, entry: &CatalogEntry) -> f64 {
        let entry_title = normalize(&entry.title);
        if !self.title.is_empty() && self.title == entry_title {
            return EXACT_MATCH_SCORE;
        }

        let producer = normalize(entry.producer_name.as_deref().unwrap_or_default());

        let title_score = sequence_similarity(&self.title, &entry_title);
        let artist_bonus = self.artist_bonus(&producer);
        let contains_bonus = if contains_either(&self.title, &entry_title) {
            TITLE_CONTAINS_BONUS
        } else {
            0.0
        };
        let word_bonus = self.word_overlap(&entry_title) * WORD_OVERLAP_WEIGHT;
        let remix_bonus = if self.remix_related(&entry_title) {
            REMIX_BONUS
        } else {
            0.0
        };

        title_score + artist_bonus + contains_bonus + word_bonus + remix_bonus
    }

    /// No bonus unless both names are present
    fn artist_bonus(&self, producer: &str) -> f64 {
        if self.artist.is_empty() || producer.is_empty() {
            0.0
        } else if contains_either(&self.artist, producer) {
            ARTIST_CONTAINS_BONUS
        } else if sequence_similarity(&self.artist, producer) > ARTIST_SIMILARITY_MIN {
            ARTIST_SIMILAR_BONUS
        } else {
            0.0
        }
    }

    fn word_overlap(&self, entry_title: &str) -> f64 {
        let entry_words: HashSet<&str> = entry_title.split_whitespace().collect();
        let largest = self.words.len().max(entry_words.len());
        if largest == 0 {
            return 0.0;
        }
        let common = self
            .words
            .iter()
            .filter(|w| entry_words.contains(w.as_str()))
            .count();
        common as f64 / largest as f64
    }

    fn remix_related(&self, entry_title: &str) -> bool {
        if !self.title.contains("remix") && !entry_title.contains("remix") {
            return false;
        }
        self.words
            .iter()
            .any(|w| w.chars().count() > REMIX_TOKEN_MIN_CHARS && entry_title.contains(w.as_str()))
    }
}

/// Substring containment in either direction; empty strings never match
fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Whether a composite score clears the acceptance threshold
pub fn accepts(total: f64, threshold: f64) -> bool {
    total >= threshold
}

/// Highest-scoring entry as `(index, score)`; ties keep the first seen
pub fn select_best(query: &MatchQuery, entries: &[CatalogEntry]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, entry) in entries.iter().enumerate() {
        let total = query.score(entry);
        if best.map_or(true, |(_, best_total)| total > best_total) {
            best = Some((index, total));
        }
    }
    best
}

/// Capability to link a fingerprint candidate to a catalog entry
#[async_trait]
pub trait TrackMatcher: Send + Sync {
    async fn find_match(
        &self,
        title: &str,
        artist: &str,
        fingerprint_id: Option<&str>,
    ) -> Result<Option<CatalogMatch>, CatalogError>;
}

/// Catalog-backed matcher: direct id lookup, then fuzzy pass
pub struct CatalogMatcher {
    catalog: Arc<dyn CatalogService>,
    accept_threshold: f64,
    candidate_limit: usize,
}

impl CatalogMatcher {
    pub fn new(catalog: Arc<dyn CatalogService>, config: &MatchingConfig) -> Self {
        Self {
            catalog,
            accept_threshold: config.accept_threshold,
            candidate_limit: config.candidate_limit.min(FUZZY_CANDIDATE_LIMIT),
        }
    }

    /// Fire-and-forget fingerprint id write-back; failures are logged only
    fn spawn_write_back(&self, catalog_id: String, fingerprint_id: String) {
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            match catalog.set_fingerprint_id(&catalog_id, &fingerprint_id).await {
                Ok(()) => debug!(catalog_id = %catalog_id, "Cached fingerprint id on catalog entry"),
                Err(e) => warn!(catalog_id = %catalog_id, error = %e, "Fingerprint id write-back failed"),
            }
        });
    }
}

#[async_trait]
impl TrackMatcher for CatalogMatcher {
    async fn find_match(
        &self,
        title: &str,
        artist: &str,
        fingerprint_id: Option<&str>,
    ) -> Result<Option<CatalogMatch>, CatalogError> {
        let fingerprint_id = fingerprint_id.map(str::trim).filter(|id| !id.is_empty());

        if let Some(id) = fingerprint_id {
            match self.catalog.find_by_fingerprint_id(id).await {
                Ok(Some(entry)) => {
                    info!(catalog_id = %entry.catalog_id, "Catalog entry found by fingerprint id");
                    return Ok(Some(CatalogMatch {
                        entry,
                        source: MatchSource::FingerprintId,
                        score: None,
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Fingerprint id lookup failed, falling back to fuzzy matching")
                }
            }
        }

        let mut entries = self.catalog.list_tracks(self.candidate_limit).await?;
        let query = MatchQuery::new(title, artist);

        let Some((index, total)) = select_best(&query, &entries) else {
            debug!("Catalog returned no entries for fuzzy matching");
            return Ok(None);
        };

        if !accepts(total, self.accept_threshold) {
            debug!(
                title = %title,
                best = %entries[index].title,
                score = total,
                "Best fuzzy catalog score below threshold"
            );
            return Ok(None);
        }

        let entry = entries.swap_remove(index);
        info!(
            title = %title,
            catalog_title = %entry.title,
            catalog_id = %entry.catalog_id,
            score = total,
            "Fuzzy catalog match accepted"
        );

        if let Some(id) = fingerprint_id {
            if entry.missing_fingerprint_id() && !entry.catalog_id.is_empty() {
                self.spawn_write_back(entry.catalog_id.clone(), id.to_string());
            }
        }

        Ok(Some(CatalogMatch {
            entry,
            source: MatchSource::Fuzzy,
            score: Some(total),
        }))
    }
}
