// Pair canonicalization
// The oracle reports every relationship from both sides (A -> B and B -> A).
// Records are keyed by an order-independent signature so each unordered pair
// is emitted once per directory pass.

use crate::core::image::{DuplicateRecord, SimilarityObservation};
use std::collections::HashMap;

/// Two scores for the same pair within this distance describe one
/// relationship, so the two directions still match when their floats differ
/// in the last bits.
pub const SCORE_TOLERANCE: f64 = 1e-6;

/// Order-independent key of one image pair.
///
/// Holds the two identifiers sorted lexically as separate fields, so distinct
/// pairs never collide the way a concatenated string key could
/// (`"ab" + "c"` vs `"a" + "bc"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalSignature {
    low: String,
    high: String,
}

impl CanonicalSignature {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn of(observation: &SimilarityObservation) -> Self {
        Self::new(&observation.source, &observation.candidate)
    }
}

fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCORE_TOLERANCE
}

/// Result of canonicalizing one directory's observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Canonicalized {
    pub records: Vec<DuplicateRecord>,
    pub redundant: usize,
    pub self_pairs: usize,
}

/// Converts raw observations into one record per unordered pair.
///
/// The seen-set lives for one processing pass of one directory. The first
/// observation of a pair decides which image is stored as `image_id`.
pub struct PairCanonicalizer {
    owner: String,
    seen: HashMap<CanonicalSignature, Vec<f64>>,
    records: Vec<DuplicateRecord>,
    redundant: usize,
    self_pairs: usize,
}

impl PairCanonicalizer {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            seen: HashMap::new(),
            records: Vec::new(),
            redundant: 0,
            self_pairs: 0,
        }
    }

    /// Feeds one observation. Returns the record it produced, if any.
    pub fn push(&mut self, observation: SimilarityObservation) -> Option<&DuplicateRecord> {
        if observation.source == observation.candidate {
            log::debug!(
                "Observation pairs {} with itself in {}. Skipped.",
                observation.source,
                self.owner
            );
            self.self_pairs += 1;
            return None;
        }

        let scores = self.seen.entry(CanonicalSignature::of(&observation)).or_default();
        if scores.iter().any(|&seen| same_score(seen, observation.score)) {
            log::info!(
                "Redundant observation skipped: {} -> {} ({}) in {}",
                observation.source,
                observation.candidate,
                observation.score,
                self.owner
            );
            self.redundant += 1;
            return None;
        }
        scores.push(observation.score);

        self.records.push(DuplicateRecord {
            owner: self.owner.clone(),
            image_id: observation.source,
            ref_image_id: observation.candidate,
            similarity: observation.score,
        });
        self.records.last()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn finish(self) -> Canonicalized {
        Canonicalized {
            records: self.records,
            redundant: self.redundant,
            self_pairs: self.self_pairs,
        }
    }
}

/// Canonicalizes a full observation sequence in oracle order.
pub fn canonicalize<I>(owner: &str, observations: I) -> Canonicalized
where
    I: IntoIterator<Item = SimilarityObservation>,
{
    let mut canonicalizer = PairCanonicalizer::new(owner);
    for observation in observations {
        canonicalizer.push(observation);
    }
    canonicalizer.finish()
}
