//! Ceteris paribus profiles and dependence curves
//!
//! Provides the profile engine:
//! - Variable grids (quantiles, uniform spacing, categorical levels)
//! - Ceteris paribus (what-if) profiles for one or more observations
//! - Pairwise ceteris paribus surfaces for a single observation
//! - Partial, conditional and accumulated dependence aggregation
//! - Oscillations (local variable importance)

mod aggregate;
mod ceteris_paribus;
mod ceteris_paribus_2d;
mod config;
mod oscillations;
mod split;

pub use aggregate::{AggregatedCurve, AggregatedPoint, GapHandling, ProfileAggregator, UnsupportedPoint};
pub use ceteris_paribus::{CeterisParibus, ProfileBuilder, ProfileRow, ProfileTable, DEFAULT_LABEL};
pub use ceteris_paribus_2d::{ProfileRow2D, ProfileTable2D};
pub use config::{AggregationConfig, AggregationType, SplitConfig, SplitType, VariableType};
pub use oscillations::{oscillations, Oscillation};
pub use split::{Grid, VariableGrid, VariableSplit, VariableSplitter};
