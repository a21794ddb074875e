//! Training loops over an [`EmbeddingStore`](crate::embedding::store::EmbeddingStore).
//!
//! - [`transe`]: static margin-ranking loop with one negative tail per triple
//! - [`temporal`]: decay-weighted regression toward observed temporal edges
//! - [`adam`]: the adaptive first-order optimiser both loops step with
//! - [`sampler`]: negative tail sampling
//!
//! Both loops update online (one optimiser step per sample) on a working copy
//! of the parameter tables and write the copy back into the store at the end
//! of every epoch. An empty sample set is not an error: the loop logs a
//! warning and reports [`TrainingOutcome::EmptyTrainingSet`]. Unusable
//! hyper-parameters are rejected the same way with
//! [`TrainingOutcome::InvalidParameters`].

pub mod adam;
pub mod sampler;
pub mod temporal;
pub mod transe;

use serde::{Deserialize, Serialize};

/// Hyper-parameters shared by both loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Margin of the ranking loss (static loop only).
    pub margin: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 0.01,
            margin: 1.0,
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    /// The learning rate must be finite and positive, the margin finite and
    /// non-negative.
    pub fn check(&self) -> Result<(), String> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(format!("learning rate must be > 0, got {}", self.learning_rate));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(format!("margin must be >= 0, got {}", self.margin));
        }
        Ok(())
    }
}

/// How a training invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingOutcome {
    /// At least one sample was available and every epoch ran.
    Trained,
    /// No usable sample; the store was left untouched.
    EmptyTrainingSet,
    /// The hyper-parameters were unusable; the store was left untouched.
    InvalidParameters,
}

/// Summary of a training invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub outcome: TrainingOutcome,
    /// Epochs actually run.
    pub epochs: usize,
    /// Usable samples per epoch.
    pub samples: usize,
    /// Mean loss per epoch.
    pub loss_history: Vec<f32>,
}

impl TrainingReport {
    pub(crate) fn empty() -> Self {
        Self {
            outcome: TrainingOutcome::EmptyTrainingSet,
            epochs: 0,
            samples: 0,
            loss_history: Vec::new(),
        }
    }

    pub(crate) fn rejected(reason: &str) -> Self {
        tracing::warn!(reason, "training parameters rejected, store left unchanged");
        Self {
            outcome: TrainingOutcome::InvalidParameters,
            ..Self::empty()
        }
    }

    pub fn is_trained(&self) -> bool {
        self.outcome == TrainingOutcome::Trained
    }

    /// Mean loss of the last epoch, if any ran.
    pub fn final_loss(&self) -> Option<f32> {
        self.loss_history.last().copied()
    }
}

impl std::fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            TrainingOutcome::EmptyTrainingSet => write!(f, "no training data, store unchanged"),
            TrainingOutcome::InvalidParameters => {
                write!(f, "invalid training parameters, store unchanged")
            }
            TrainingOutcome::Trained => {
                write!(f, "{} epochs over {} samples", self.epochs, self.samples)?;
                if let Some(loss) = self.final_loss() {
                    write!(f, ", final loss {loss:.4}")?;
                }
                Ok(())
            }
        }
    }
}

/// `v / ‖v‖`, or zeros when the norm vanishes.
pub(crate) fn unit(v: &[f32]) -> Vec<f32> {
    let norm = crate::embedding::l2_norm(v);
    if norm <= f32::EPSILON {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_vector_and_zero_guard() {
        let u = unit(&[3.0, 4.0]);
        assert!((u[0] - 0.6).abs() < 1e-6);
        assert!((u[1] - 0.8).abs() < 1e-6);
        assert_eq!(unit(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn report_display() {
        assert_eq!(
            TrainingReport::empty().to_string(),
            "no training data, store unchanged"
        );
        let report = TrainingReport {
            outcome: TrainingOutcome::Trained,
            epochs: 2,
            samples: 5,
            loss_history: vec![0.9, 0.5],
        };
        assert!(report.is_trained());
        assert_eq!(report.to_string(), "2 epochs over 5 samples, final loss 0.5000");
    }

    #[test]
    fn config_builder() {
        let config = TrainingConfig::default()
            .with_epochs(3)
            .with_learning_rate(0.05)
            .with_margin(2.0);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.margin, 2.0);
    }

    #[test]
    fn unusable_parameters_are_caught() {
        assert!(TrainingConfig::default().check().is_ok());
        for lr in [0.0, -0.01, f32::NAN, f32::INFINITY] {
            assert!(TrainingConfig::default().with_learning_rate(lr).check().is_err(), "{lr}");
        }
        for margin in [-1.0, f32::NAN] {
            assert!(TrainingConfig::default().with_margin(margin).check().is_err(), "{margin}");
        }
        let report = TrainingReport::rejected("learning rate must be > 0");
        assert_eq!(report.outcome, TrainingOutcome::InvalidParameters);
        assert!(!report.is_trained());
        assert_eq!(report.to_string(), "invalid training parameters, store unchanged");
    }
}
