//! Ceteris - model-agnostic explanation profiles
//!
//! This crate explains any fitted model that can score a batch of rows:
//! - Variable grids from reference data
//! - Ceteris paribus (what-if) profiles, single and pairwise
//! - Partial, conditional and accumulated dependence curves
//! - Permutation variable importance
//!
//! # Modules
//!
//! - [`data`] - Typed columnar datasets, schemas and polars interop
//! - [`model`] - The prediction capability explanations rely on
//! - [`profiles`] - Grids, ceteris paribus profiles and their aggregation
//! - [`importance`] - Permutation importance and loss functions
//! - [`sampling`] - Choosing observations to explain

// Core error handling
pub mod error;

// Data and model seams
pub mod data;
pub mod model;

// Explanations
pub mod profiles;
pub mod importance;

// Utilities
pub mod sampling;

pub use error::{ProfileError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ProfileError, Result};

    // Data
    pub use crate::data::{Column, ColumnKind, Dataset, Schema, Value};

    // Models
    pub use crate::model::{NumericModel, Predict};

    // Profiles
    pub use crate::profiles::{
        AggregatedCurve, AggregationConfig, AggregationType, CeterisParibus, ProfileAggregator,
        ProfileBuilder, ProfileTable, ProfileTable2D, SplitConfig, SplitType, VariableSplitter,
    };

    // Importance
    pub use crate::importance::{ImportanceConfig, ImportanceType, PermutationImportance};

    // Sampling
    pub use crate::sampling::{select_neighbours, select_sample};
}
