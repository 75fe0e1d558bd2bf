//! Permutation variable importance
//!
//! Provides:
//! - Permutation importance with reproducible seeds and row subsampling
//! - Jointly permuted variable groups
//! - Difference, ratio and raw importance scores
//! - Standard regression and classification losses

mod config;
mod loss;
mod permutation;

pub use config::{ImportanceConfig, ImportanceType};
pub use loss::{
    loss_cross_entropy, loss_mean_absolute_error, loss_one_minus_accuracy, loss_root_mean_square,
    loss_sum_of_squares,
};
pub use permutation::{
    ImportanceRecord, ImportanceResult, PermutationImportance, BASELINE, FULL_MODEL,
};
