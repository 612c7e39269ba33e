//! Relationship deduplication
//!
//! Reduces a batch of relationships to at most one edge per (source, target)
//! pair in four fixed stages:
//!
//! 1. exact duplicates on (source, type, target) collapse
//! 2. multiple types on the same pair collapse by the priority table
//! 3. low-quality edges are filtered out
//! 4. the priority table is re-applied over the whole surviving set
//!
//! Decisions depend on the complete batch, so this runs after all raw
//! relationships of a run have been collected.

use super::models::{GraphRelationship, RelationshipType};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Edges below this confidence are dropped
pub const MIN_CONFIDENCE: f64 = 0.2;
/// RELATED_TO edges with a generic description survive only above this confidence
pub const RELATED_TO_MIN_CONFIDENCE: f64 = 0.5;
/// Upper bound of the medium quality bucket (exclusive for high)
pub const HIGH_QUALITY_THRESHOLD: f64 = 0.7;
/// Lower bound of the medium quality bucket
pub const MEDIUM_QUALITY_THRESHOLD: f64 = 0.4;

const GENERIC_DESCRIPTIONS: &[&str] = &[
    "related",
    "related to",
    "relates to",
    "relationship",
    "associated",
    "associated with",
    "connected",
    "connected to",
    "linked",
    "linked to",
];

/// Types that make a REFERENCES edge on the same pair redundant
const SPECIFIC_TYPES: &[RelationshipType] = &[
    RelationshipType::Imports,
    RelationshipType::UsesType,
    RelationshipType::Calls,
    RelationshipType::Contains,
    RelationshipType::Defines,
];

/// Counts of surviving edges per confidence bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityBreakdown {
    /// confidence > 0.7
    pub high: usize,
    /// 0.4 <= confidence <= 0.7
    pub medium: usize,
    /// confidence < 0.4
    pub low: usize,
}

/// How many edges each stage removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub input: usize,
    pub exact_duplicates: usize,
    pub semantic_reductions: usize,
    pub quality_filtered: usize,
    pub hierarchy_reductions: usize,
    pub output: usize,
}

/// Result of a deduplication pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub relationships: Vec<GraphRelationship>,
    pub by_type: BTreeMap<RelationshipType, usize>,
    pub quality: QualityBreakdown,
    pub stats: DedupStats,
}

impl DedupReport {
    /// Ids present in `original` that did not survive
    pub fn removed_ids(&self, original: &[GraphRelationship]) -> Vec<String> {
        let kept: HashSet<&str> = self.relationships.iter().map(|r| r.id.as_str()).collect();
        let mut removed: Vec<String> = original
            .iter()
            .filter(|r| !kept.contains(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();
        removed.sort();
        removed.dedup();
        removed
    }
}

/// Ordering where `Less` means `a` should be kept over `b`.
///
/// Lower priority number wins, then higher confidence, then newer creation
/// time. The id comparison only makes the choice independent of input order.
fn preference(a: &GraphRelationship, b: &GraphRelationship) -> Ordering {
    a.rel_type
        .priority()
        .cmp(&b.rel_type.priority())
        .then_with(|| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.created_at().cmp(&a.created_at()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Keep one relationship per key, chosen by `preference`
fn reduce_by<K: Ord>(
    relationships: Vec<GraphRelationship>,
    key: impl Fn(&GraphRelationship) -> K,
) -> Vec<GraphRelationship> {
    let mut best: BTreeMap<K, GraphRelationship> = BTreeMap::new();
    for rel in relationships {
        let k = key(&rel);
        match best.get(&k) {
            Some(current) if preference(current, &rel) != Ordering::Greater => {}
            _ => {
                best.insert(k, rel);
            }
        }
    }
    best.into_values().collect()
}

fn pair_key(rel: &GraphRelationship) -> (String, String) {
    (rel.source.clone(), rel.target.clone())
}

fn is_generic_description(rel: &GraphRelationship) -> bool {
    match rel.description() {
        None => true,
        Some(desc) => {
            let normalized = desc.trim().to_lowercase().replace('_', " ");
            GENERIC_DESCRIPTIONS.contains(&normalized.as_str())
                || normalized == rel.rel_type.as_str().to_lowercase().replace('_', " ")
        }
    }
}

fn passes_quality_filter(
    rel: &GraphRelationship,
    specific_pairs: &HashSet<(String, String)>,
) -> bool {
    if rel.confidence() < MIN_CONFIDENCE {
        return false;
    }
    match rel.rel_type {
        RelationshipType::RelatedTo => {
            !is_generic_description(rel) || rel.confidence() > RELATED_TO_MIN_CONFIDENCE
        }
        RelationshipType::References => {
            !specific_pairs.contains(&(rel.source.clone(), rel.target.clone()))
        }
        _ => true,
    }
}

fn quality_bucket(confidence: f64, quality: &mut QualityBreakdown) {
    if confidence > HIGH_QUALITY_THRESHOLD {
        quality.high += 1;
    } else if confidence >= MEDIUM_QUALITY_THRESHOLD {
        quality.medium += 1;
    } else {
        quality.low += 1;
    }
}

/// Run the four-stage reduction over a complete batch of relationships
pub fn deduplicate(relationships: Vec<GraphRelationship>) -> DedupReport {
    let mut stats = DedupStats {
        input: relationships.len(),
        ..Default::default()
    };

    // Stage 1: exact (source, type, target) duplicates
    let exact = reduce_by(relationships, |r| {
        (r.source.clone(), r.rel_type, r.target.clone())
    });
    stats.exact_duplicates = stats.input - exact.len();

    let specific_pairs: HashSet<(String, String)> = exact
        .iter()
        .filter(|r| SPECIFIC_TYPES.contains(&r.rel_type))
        .map(pair_key)
        .collect();

    // Stage 2: one type per (source, target)
    let before = exact.len();
    let semantic = reduce_by(exact, pair_key);
    stats.semantic_reductions = before - semantic.len();

    // Stage 3: quality filter
    let before = semantic.len();
    let filtered: Vec<GraphRelationship> = semantic
        .into_iter()
        .filter(|r| passes_quality_filter(r, &specific_pairs))
        .collect();
    stats.quality_filtered = before - filtered.len();

    // Stage 4: global hierarchy pass
    let before = filtered.len();
    let survivors = reduce_by(filtered, pair_key);
    stats.hierarchy_reductions = before - survivors.len();
    stats.output = survivors.len();

    let mut by_type = BTreeMap::new();
    let mut quality = QualityBreakdown::default();
    for rel in &survivors {
        *by_type.entry(rel.rel_type).or_insert(0) += 1;
        quality_bucket(rel.confidence(), &mut quality);
    }

    tracing::debug!(
        input = stats.input,
        output = stats.output,
        exact = stats.exact_duplicates,
        semantic = stats.semantic_reductions,
        filtered = stats.quality_filtered,
        "Deduplicated relationships"
    );

    DedupReport {
        relationships: survivors,
        by_type,
        quality,
        stats,
    }
}
