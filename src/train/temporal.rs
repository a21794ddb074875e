//! Decay-weighted temporal training.
//!
//! Each temporal triple pulls `h + r` toward `t` with a loss of
//! `w · ‖h + r - t‖`, where the weight `w` shrinks with the age of the
//! observation relative to the newest year in the sample set:
//!
//! ```text
//! floor  = min(min_year, year - lookback_years)
//! weight = clamp(1 - (max_year - year) / (max_year - floor), min_weight, max_weight)
//! ```
//!
//! There is no negative sampling.

use serde::{Deserialize, Serialize};

use crate::embedding::store::EmbeddingStore;
use crate::embedding::{l2_norm, translate};
use crate::graph::TemporalTriple;

use super::adam::{Adam, GradientBatch, Param};
use super::{TrainingConfig, TrainingOutcome, TrainingReport, unit};

/// Constants of the decay weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_lookback_years")]
    pub lookback_years: i32,
    #[serde(default = "default_min_weight")]
    pub min_weight: f32,
    #[serde(default = "default_max_weight")]
    pub max_weight: f32,
}

fn default_lookback_years() -> i32 {
    10
}

fn default_min_weight() -> f32 {
    0.1
}

fn default_max_weight() -> f32 {
    1.0
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            lookback_years: default_lookback_years(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
        }
    }
}

impl DecayConfig {
    /// Both bounds finite with `0 <= min_weight <= max_weight`.
    pub fn check(&self) -> Result<(), String> {
        let (min, max) = (self.min_weight, self.max_weight);
        if min.is_finite() && max.is_finite() && 0.0 <= min && min <= max {
            Ok(())
        } else {
            Err(format!(
                "decay weights must satisfy 0 <= min_weight <= max_weight, got {min} and {max}"
            ))
        }
    }
}

/// Weight of a sample from `year` in a set spanning `[min_year, max_year]`.
///
/// A zero denominator yields `1.0` (before clamping). Bounds that fail
/// [`DecayConfig::check`] do not panic: a NaN bound is ignored and crossed
/// bounds resolve to `max_weight`.
pub fn decay_weight(year: i32, min_year: i32, max_year: i32, decay: &DecayConfig) -> f32 {
    let floor = min_year.min(year.saturating_sub(decay.lookback_years));
    let denom = max_year as f64 - floor as f64;
    let raw = if denom == 0.0 {
        1.0
    } else {
        1.0 - (max_year as f64 - year as f64) / denom
    };
    (raw as f32).max(decay.min_weight).min(decay.max_weight)
}

/// Train `store` on `triples`, weighting each by [`decay_weight`].
///
/// Year bounds are taken over every triple given, including those skipped
/// for unknown members.
pub fn train(
    store: &mut EmbeddingStore,
    triples: &[TemporalTriple],
    config: &TrainingConfig,
    decay: &DecayConfig,
) -> TrainingReport {
    if let Err(reason) = config.check().and_then(|()| decay.check()) {
        return TrainingReport::rejected(&reason);
    }
    let (Some(min_year), Some(max_year)) = (
        triples.iter().map(|t| t.year).min(),
        triples.iter().map(|t| t.year).max(),
    ) else {
        tracing::warn!("no temporal data for temporal training, store left unchanged");
        return TrainingReport::empty();
    };

    let samples: Vec<(usize, usize, usize, f32)> = triples
        .iter()
        .filter_map(|triple| {
            let h = store.entities().index_of(&triple.head)?;
            let r = store.relations().index_of(&triple.relation)?;
            let t = store.entities().index_of(&triple.tail)?;
            Some((h, r, t, decay_weight(triple.year, min_year, max_year, decay)))
        })
        .collect();

    if samples.is_empty() {
        tracing::warn!(
            triples = triples.len(),
            "no temporal triple has known members, store left unchanged"
        );
        return TrainingReport::empty();
    }
    if samples.len() < triples.len() {
        tracing::debug!(
            skipped = triples.len() - samples.len(),
            "skipped temporal triples with unknown members"
        );
    }

    tracing::info!(
        samples = samples.len(),
        epochs = config.epochs,
        min_year,
        max_year,
        "starting temporal training"
    );

    let mut entities = store.entity_vectors().to_vec();
    let mut relations = store.relation_vectors().to_vec();
    let mut optimizer = Adam::new(config.learning_rate);
    let mut loss_history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        let mut total_loss = 0.0f32;

        for &(h, r, t, weight) in &samples {
            let p = translate(&entities[h], &relations[r], &entities[t]);
            total_loss += weight * l2_norm(&p);

            let up = unit(&p);
            let mut batch = GradientBatch::new();
            batch.add(Param::Entity(h), &up, weight);
            batch.add(Param::Relation(r), &up, weight);
            batch.add(Param::Entity(t), &up, -weight);
            batch.apply(&mut optimizer, &mut entities, &mut relations);
        }

        store.write_back(&entities, &relations);

        let mean_loss = total_loss / samples.len() as f32;
        loss_history.push(mean_loss);
        tracing::info!(epoch = epoch + 1, loss = mean_loss, "temporal epoch finished");
    }

    TrainingReport {
        outcome: TrainingOutcome::Trained,
        epochs: config.epochs,
        samples: samples.len(),
        loss_history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Dimension;
    use crate::scoring::distance;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn store() -> EmbeddingStore {
        let mut rng = StdRng::seed_from_u64(11);
        let entities: Vec<String> = ["Acme", "Globex", "Initech"].map(String::from).to_vec();
        EmbeddingStore::initialize(
            &entities,
            &["INVESTS_IN".to_string()],
            Dimension(8),
            0.1,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn weight_examples() {
        let decay = DecayConfig::default();
        assert_eq!(decay_weight(2020, 2000, 2020, &decay), 1.0);
        assert!((decay_weight(2010, 2000, 2020, &decay) - 0.5).abs() < 1e-6);
        assert!((decay_weight(2000, 2000, 2020, &decay) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn weight_stays_in_bounds() {
        let decay = DecayConfig::default();
        for (min_year, max_year) in [(1950, 2024), (2023, 2024), (2024, 2024)] {
            for year in min_year - 10..=max_year {
                let w = decay_weight(year, min_year, max_year, &decay);
                assert!((0.1..=1.0).contains(&w), "{year}: {w}");
            }
        }
        // Far outside the window the lower clamp applies.
        assert_eq!(decay_weight(1900, 1900, 2024, &decay), 0.1);
    }

    #[test]
    fn zero_denominator_is_guarded() {
        let decay = DecayConfig {
            lookback_years: 0,
            ..DecayConfig::default()
        };
        assert_eq!(decay_weight(2020, 2020, 2020, &decay), 1.0);
    }

    #[test]
    fn broken_bounds_do_not_panic() {
        let nan_floor = DecayConfig {
            min_weight: f32::NAN,
            ..DecayConfig::default()
        };
        assert!(nan_floor.check().is_err());
        assert!((decay_weight(2010, 2000, 2020, &nan_floor) - 0.5).abs() < 1e-6);

        let crossed = DecayConfig {
            min_weight: 0.9,
            max_weight: 0.2,
            ..DecayConfig::default()
        };
        assert!(crossed.check().is_err());
        assert_eq!(decay_weight(2010, 2000, 2020, &crossed), 0.2);
        assert!(DecayConfig::default().check().is_ok());
    }

    #[test]
    fn invalid_parameters_leave_store_unchanged() {
        let mut s = store();
        let before = s.clone();
        let triples = [TemporalTriple::new("Acme", "INVESTS_IN", "Globex", 2020)];

        let nan_decay = DecayConfig {
            min_weight: f32::NAN,
            ..DecayConfig::default()
        };
        let report = train(&mut s, &triples, &TrainingConfig::default(), &nan_decay);
        assert_eq!(report.outcome, TrainingOutcome::InvalidParameters);
        assert_eq!(s, before);

        let negative_lr = TrainingConfig::default().with_learning_rate(-0.5);
        let report = train(&mut s, &triples, &negative_lr, &DecayConfig::default());
        assert_eq!(report.outcome, TrainingOutcome::InvalidParameters);
        assert_eq!(s, before);
    }

    #[test]
    fn empty_set_is_a_noop() {
        let mut s = store();
        let before = s.clone();
        let report = train(&mut s, &[], &TrainingConfig::default(), &DecayConfig::default());
        assert_eq!(report.outcome, TrainingOutcome::EmptyTrainingSet);
        assert_eq!(s, before);

        let unknown = [TemporalTriple::new("Acme", "INVESTS_IN", "Hooli", 2020)];
        let report = train(&mut s, &unknown, &TrainingConfig::default(), &DecayConfig::default());
        assert_eq!(report.outcome, TrainingOutcome::EmptyTrainingSet);
        assert_eq!(s, before);
    }

    #[test]
    fn training_pulls_triples_together() {
        let mut s = store();
        let triples = [
            TemporalTriple::new("Acme", "INVESTS_IN", "Globex", 2015),
            TemporalTriple::new("Acme", "INVESTS_IN", "Initech", 2022),
        ];
        let d = |s: &EmbeddingStore, tail: &str| {
            distance(
                s.entity("Acme").unwrap(),
                s.relation("INVESTS_IN").unwrap(),
                s.entity(tail).unwrap(),
            )
        };
        let before = d(&s, "Initech");

        let report = train(
            &mut s,
            &triples,
            &TrainingConfig::default().with_epochs(20),
            &DecayConfig::default(),
        );
        assert!(report.is_trained());
        assert_eq!(report.samples, 2);
        assert_eq!(report.loss_history.len(), 20);
        assert!(d(&s, "Initech") < before);
        assert!(report.final_loss().unwrap() < report.loss_history[0]);
    }
}
