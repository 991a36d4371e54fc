use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{SplitError, SplitResult};

/// One entry of the class table: the model classifies amongst these.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    pub index: usize,
    /// Display color used by downstream visualization tooling
    pub color: [u8; 3],
}

/// How candidate subsets are chosen for each similarity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Greedy arg-min of the summed absolute per-class imbalance
    AdditiveImbalance,
    /// Greedy arg-min of the simulated Jensen-Shannon divergence
    Jsd,
    /// Seeded multilabel stratified shuffle over whole groups,
    /// replacing the scored loop entirely
    StratifiedShuffle,
}

impl Strategy {
    pub fn as_str(&self) -> &str {
        match self {
            Strategy::AdditiveImbalance => "additive-imbalance",
            Strategy::Jsd => "jsd",
            Strategy::StratifiedShuffle => "stratified-shuffle",
        }
    }
}

fn default_image_extension() -> String {
    "jpg".to_string()
}

/// Configuration for one split run, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    /// Ordered class table; indices must be dense, zero-based, contiguous
    pub classes: Vec<ClassEntry>,
    /// Target size ratios: (training, validation) or
    /// (training, validation, testing); positive, summing to ~1.0
    pub split_ratios: Vec<f64>,
    pub seed: u64,
    pub strategy: Strategy,
    /// Root holding the full dataset's Images/ and Masks/ directories
    pub dataset_root: PathBuf,
    pub metadata_path: PathBuf,
    pub training_path: PathBuf,
    pub validation_path: PathBuf,
    #[serde(default)]
    pub testing_path: Option<PathBuf>,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

impl SplitConfig {
    /// Load and validate a configuration file. Unlike user settings, a
    /// split run must not proceed on a guessed config, so every failure
    /// here is fatal.
    pub fn load(path: &Path) -> SplitResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SplitError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: SplitConfig = serde_json::from_str(&contents)
            .map_err(|e| SplitError::Config(format!("cannot parse {:?}: {}", path, e)))?;
        config.validate()?;
        info!(
            "Loaded configuration from {:?}: {} classes, ratios {:?}, strategy {}",
            path,
            config.num_classes(),
            config.split_ratios,
            config.strategy.as_str()
        );
        Ok(config)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Whether this run produces a testing subset in addition to
    /// training and validation.
    pub fn has_testing(&self) -> bool {
        self.split_ratios.len() == 3
    }

    pub fn validate(&self) -> SplitResult<()> {
        if self.classes.is_empty() {
            return Err(SplitError::Config("class table is empty".to_string()));
        }

        // Class indices must enumerate [0, num_classes) exactly once each.
        let mut seen = vec![false; self.classes.len()];
        for entry in &self.classes {
            if entry.index >= self.classes.len() || seen[entry.index] {
                return Err(SplitError::Config(format!(
                    "class table indices must be dense and zero-based; class {:?} has index {}",
                    entry.name, entry.index
                )));
            }
            seen[entry.index] = true;
        }

        if self.split_ratios.len() != 2 && self.split_ratios.len() != 3 {
            return Err(SplitError::Config(format!(
                "split_ratios must have 2 or 3 entries, got {}",
                self.split_ratios.len()
            )));
        }
        if self.split_ratios.iter().any(|&r| r <= 0.0) {
            return Err(SplitError::Config(
                "split_ratios must all be positive".to_string(),
            ));
        }
        let sum: f64 = self.split_ratios.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(SplitError::Config(format!(
                "split_ratios must sum to 1.0, got {}",
                sum
            )));
        }

        if self.has_testing() && self.testing_path.is_none() {
            return Err(SplitError::Config(
                "three split_ratios given but no testing_path configured".to_string(),
            ));
        }
        if !self.has_testing() && self.testing_path.is_some() {
            warn!("testing_path is configured but ignored for a two-way split");
        }

        Ok(())
    }
}
