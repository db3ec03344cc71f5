use std::collections::HashSet;

use crate::models::{MatchType, Student};

/// OCR results below this confidence are rejected before any matching.
pub const MIN_CONFIDENCE: f64 = 50.0;
/// Fuzzy name matching is only attempted at or above this confidence.
pub const NAME_MATCH_MIN_CONFIDENCE: f64 = 75.0;
/// Minimum Jaccard similarity for a name match to count.
pub const NAME_MATCH_THRESHOLD: f64 = 0.7;

/// Fields read off a scanned ID card, after merging the OCR response
/// with anything recovered from its raw text.
#[derive(Debug, Clone, Default)]
pub struct CardRead {
    pub student_code: Option<String>,
    pub student_name: Option<String>,
    pub confidence: f64,
}

pub fn accepts_confidence(confidence: f64) -> bool {
    confidence >= MIN_CONFIDENCE
}

/// Resolve a card read against the roster. Exact code match wins first;
/// fuzzy name matching only runs when the code tier failed, a name is
/// present, and confidence clears the name-match bar.
pub fn resolve<'a>(read: &CardRead, roster: &'a [Student]) -> Option<(&'a Student, MatchType)> {
    if let Some(code) = read.student_code.as_deref() {
        if !code.is_empty() {
            if let Some(student) = roster.iter().find(|s| s.student_code == code) {
                return Some((student, MatchType::IdMatch));
            }
        }
    }

    if read.confidence >= NAME_MATCH_MIN_CONFIDENCE {
        if let Some(name) = read.student_name.as_deref() {
            if !name.trim().is_empty() {
                if let Some((student, _)) = best_name_match(name, roster) {
                    return Some((student, MatchType::NameMatch));
                }
            }
        }
    }

    None
}

/// Best-scoring roster entry for a name, provided it clears the threshold.
/// Strict `>` during the scan keeps the earliest roster entry on ties.
pub fn best_name_match<'a>(name: &str, roster: &'a [Student]) -> Option<(&'a Student, f64)> {
    let mut best: Option<(&Student, f64)> = None;

    for student in roster {
        let score = name_similarity(name, &student.name);
        let improved = match best {
            Some((_, top)) => score > top,
            None => true,
        };
        if improved {
            best = Some((student, score));
        }
    }

    best.filter(|(_, score)| *score >= NAME_MATCH_THRESHOLD)
}

/// Jaccard index over lowercased word sets. Symmetric, word-order
/// insensitive, and duplicate-insensitive; two empty names score 0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let left = word_set(a);
    let right = word_set(b);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

fn word_set(name: &str) -> HashSet<String> {
    name.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
