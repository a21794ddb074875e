//! Prediction engines.
//!
//! - [`interpolation::InterpolationEngine`]: complete a partially given triple
//! - [`extrapolation::ExtrapolationEngine`]: forecast an entity's future
//!   relations from its temporal history
//!
//! Both produce [`Prediction`]s ranked with [`rank`]: descending score, ties
//! broken lexically on `(source, relation, target)`, truncated to `top_k`.

pub mod extrapolation;
pub mod interpolation;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A scored candidate completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub source: String,
    pub relation: String,
    pub target: String,
    /// Unitless ranking heuristic; higher is more plausible.
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Prediction {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
            score,
            predicted_year: None,
            rationale: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.predicted_year = Some(year);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -[{}]-> {} ({:.4})",
            self.source, self.relation, self.target, self.score
        )?;
        if let Some(year) = self.predicted_year {
            write!(f, " by {year}")?;
        }
        if let Some(rationale) = &self.rationale {
            write!(f, ": {rationale}")?;
        }
        Ok(())
    }
}

fn ranking_order(a: &Prediction, b: &Prediction) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.relation.cmp(&b.relation))
        .then_with(|| a.target.cmp(&b.target))
}

/// Sort by descending score with lexical tie-breaking and keep `top_k`.
pub fn rank(mut predictions: Vec<Prediction>, top_k: usize) -> Vec<Prediction> {
    predictions.sort_by(ranking_order);
    predictions.truncate(top_k);
    predictions
}
