//! Engine configuration, persisted as TOML.
//!
//! Every field has a serde default, so a partial (or empty) file is valid:
//!
//! ```toml
//! dimension = 64
//! seed = 7
//!
//! [training]
//! epochs = 20
//!
//! [extrapolation]
//! current_year = 2024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embedding::Dimension;
use crate::embedding::store::DEFAULT_INIT_STD_DEV;
use crate::error::ConfigError;
use crate::predict::extrapolation::ExtrapolationConfig;
use crate::scoring::Similarity;
use crate::train::TrainingConfig;
use crate::train::temporal::DecayConfig;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration for the augur engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Maximum entities enumerated from the backend at build time.
    #[serde(default = "default_entity_limit")]
    pub entity_limit: usize,
    /// Maximum relation types enumerated from the backend at build time.
    #[serde(default = "default_relation_limit")]
    pub relation_limit: usize,
    /// RNG seed for initialization and negative sampling. OS entropy if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Standard deviation of the initial Normal draw.
    #[serde(default = "default_init_std_dev")]
    pub init_std_dev: f32,
    #[serde(default)]
    pub training: TrainingSection,
    #[serde(default)]
    pub decay: DecayConfig,
    #[serde(default)]
    pub extrapolation: ExtrapolationConfig,
    #[serde(default)]
    pub interpolation: InterpolationSection,
}

fn default_dimension() -> usize {
    Dimension::DEFAULT.0
}
fn default_entity_limit() -> usize {
    1000
}
fn default_relation_limit() -> usize {
    100
}
fn default_init_std_dev() -> f32 {
    DEFAULT_INIT_STD_DEV
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            entity_limit: default_entity_limit(),
            relation_limit: default_relation_limit(),
            seed: None,
            init_std_dev: default_init_std_dev(),
            training: TrainingSection::default(),
            decay: DecayConfig::default(),
            extrapolation: ExtrapolationConfig::default(),
            interpolation: InterpolationSection::default(),
        }
    }
}

/// `[training]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSection {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_temporal_epochs")]
    pub temporal_epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_margin")]
    pub margin: f32,
}

fn default_epochs() -> usize {
    10
}
fn default_temporal_epochs() -> usize {
    5
}
fn default_learning_rate() -> f32 {
    0.01
}
fn default_margin() -> f32 {
    1.0
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            temporal_epochs: default_temporal_epochs(),
            learning_rate: default_learning_rate(),
            margin: default_margin(),
        }
    }
}

impl TrainingSection {
    /// Hyper-parameters of the static loop.
    pub fn static_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            margin: self.margin,
        }
    }

    /// Hyper-parameters of the temporal loop.
    pub fn temporal_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.temporal_epochs,
            learning_rate: self.learning_rate,
            margin: self.margin,
        }
    }
}

/// `[interpolation]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpolationSection {
    #[serde(default)]
    pub similarity: Similarity,
}

impl EngineConfig {
    pub fn dimension(&self) -> Dimension {
        Dimension(self.dimension)
    }

    /// Reject values no engine can run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });
        if self.dimension == 0 {
            return invalid("dimension must be > 0".into());
        }
        if !(self.init_std_dev.is_finite() && self.init_std_dev >= 0.0) {
            return invalid(format!("init_std_dev must be >= 0, got {}", self.init_std_dev));
        }
        // Float bounds must also be finite.
        if let Err(reason) = self.training.static_config().check() {
            return invalid(format!("training: {reason}"));
        }
        if let Err(reason) = self.decay.check() {
            return invalid(reason);
        }
        let weights = [
            self.extrapolation.pattern_weight,
            self.extrapolation.embedding_weight,
        ];
        if !weights.iter().all(|w| w.is_finite() && *w >= 0.0) {
            return invalid(format!(
                "extrapolation weights must be finite and >= 0, got {} and {}",
                weights[0], weights[1]
            ));
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.dimension, 128);
        assert_eq!(config.entity_limit, 1000);
        assert_eq!(config.relation_limit, 100);
        assert_eq!(config.training.epochs, 10);
        assert_eq!(config.training.temporal_epochs, 5);
        assert_eq!(config.decay.lookback_years, 10);
        assert_eq!(config.interpolation.similarity, Similarity::Cosine);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            dimension = 32
            seed = 7

            [training]
            epochs = 3

            [decay]
            min_weight = 0.2

            [interpolation]
            similarity = "negative_distance"
            "#,
        )
        .unwrap();
        assert_eq!(config.dimension(), Dimension(32));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.learning_rate, 0.01);
        assert_eq!(config.decay.min_weight, 0.2);
        assert_eq!(config.decay.max_weight, 1.0);
        assert_eq!(config.interpolation.similarity, Similarity::NegativeDistance);
        assert_eq!(config.training.temporal_config().epochs, 5);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conf").join("augur.toml");
        let config = EngineConfig {
            seed: Some(42),
            extrapolation: ExtrapolationConfig {
                current_year: Some(2024),
                ..ExtrapolationConfig::default()
            },
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            EngineConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "dimension = \"wide\"").unwrap();
        match EngineConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert!(p.ends_with("bad.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let bad = [
            EngineConfig {
                dimension: 0,
                ..EngineConfig::default()
            },
            EngineConfig {
                training: TrainingSection {
                    learning_rate: 0.0,
                    ..TrainingSection::default()
                },
                ..EngineConfig::default()
            },
            EngineConfig {
                decay: DecayConfig {
                    min_weight: 0.9,
                    max_weight: 0.5,
                    ..DecayConfig::default()
                },
                ..EngineConfig::default()
            },
            EngineConfig {
                extrapolation: ExtrapolationConfig {
                    pattern_weight: -0.6,
                    ..ExtrapolationConfig::default()
                },
                ..EngineConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
        }
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let cases = [
            "[decay]\nmin_weight = nan\n",
            "[decay]\nmax_weight = inf\n",
            "[training]\nmargin = nan\n",
            "[training]\nlearning_rate = nan\n",
            "[extrapolation]\npattern_weight = nan\n",
            "[extrapolation]\nembedding_weight = inf\n",
            "init_std_dev = nan\n",
        ];
        for toml in cases {
            let config = EngineConfig::from_toml(toml).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "accepted {toml:?}"
            );
        }
    }
}
