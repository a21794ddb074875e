//! Translational scoring.
//!
//! A triple `(h, r, t)` is plausible when `h + r` lands close to `t`:
//!
//! ```text
//! score(h, r, t) = -‖h + r - t‖₂
//! ```
//!
//! Training minimises the distance, but candidates are usually ranked by the
//! cosine similarity between the predicted point `h + r` and each candidate.
//! [`Similarity`] names the metric used at a ranking site; a single ranking
//! never mixes the two.

use serde::{Deserialize, Serialize};

use crate::embedding::{dot, l2_norm, translate};

/// Translational distance `‖h + r - t‖₂`.
pub fn distance(h: &[f32], r: &[f32], t: &[f32]) -> f32 {
    l2_norm(&translate(h, r, t))
}

/// Plausibility score `-‖h + r - t‖₂`; higher is better.
pub fn score(h: &[f32], r: &[f32], t: &[f32]) -> f32 {
    -distance(h, r, t)
}

/// Cosine similarity; `0.0` when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Ranking metric between a predicted point and a candidate vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine of the angle between predicted point and candidate.
    #[default]
    Cosine,
    /// Negative Euclidean distance between predicted point and candidate.
    NegativeDistance,
}

impl Similarity {
    /// Score a candidate against the predicted point `h + r`. Higher is better.
    pub fn score(self, predicted: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(predicted, candidate),
            Similarity::NegativeDistance => {
                debug_assert_eq!(predicted.len(), candidate.len());
                -predicted
                    .iter()
                    .zip(candidate)
                    .map(|(p, c)| (p - c) * (p - c))
                    .sum::<f32>()
                    .sqrt()
            }
        }
    }
}

impl std::fmt::Display for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Similarity::Cosine => write!(f, "cosine"),
            Similarity::NegativeDistance => write!(f, "negative-distance"),
        }
    }
}
