//! Permutation importance configuration

use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a permuted loss is turned into an importance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceType {
    /// Permuted loss minus full model loss
    #[default]
    Difference,
    /// Permuted loss divided by full model loss
    Ratio,
    /// Permuted loss as is
    Raw,
}

impl ImportanceType {
    pub(crate) fn score(&self, permuted_loss: f64, full_model_loss: f64) -> f64 {
        match self {
            ImportanceType::Difference => permuted_loss - full_model_loss,
            ImportanceType::Ratio => permuted_loss / full_model_loss,
            ImportanceType::Raw => permuted_loss,
        }
    }
}

impl FromStr for ImportanceType {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "difference" => Ok(ImportanceType::Difference),
            "ratio" => Ok(ImportanceType::Ratio),
            "raw" => Ok(ImportanceType::Raw),
            other => Err(ProfileError::InvalidInput(format!(
                "unsupported importance type '{}' (expected difference, ratio or raw)",
                other
            ))),
        }
    }
}

impl fmt::Display for ImportanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportanceType::Difference => "difference",
            ImportanceType::Ratio => "ratio",
            ImportanceType::Raw => "raw",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for permutation importance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceConfig {
    /// Number of shuffles per variable
    pub n_permutations: usize,

    /// Seed for the shuffles; fresh entropy when unset
    pub seed: Option<u64>,

    /// Rows drawn (without replacement) for each permutation round;
    /// every row when unset
    pub sample_size: Option<usize>,

    pub importance_type: ImportanceType,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            n_permutations: 10,
            seed: None,
            sample_size: None,
            importance_type: ImportanceType::Difference,
        }
    }
}

impl ImportanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_permutations(mut self, n_permutations: usize) -> Self {
        self.n_permutations = n_permutations.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    pub fn with_type(mut self, importance_type: ImportanceType) -> Self {
        self.importance_type = importance_type;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_permutations == 0 {
            return Err(ProfileError::InvalidParameter {
                name: "n_permutations".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.sample_size == Some(0) {
            return Err(ProfileError::InvalidParameter {
                name: "sample_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
