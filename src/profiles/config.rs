//! Profile configuration

use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How numeric grids are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitType {
    /// Quantiles of the observed values
    Quantiles,
    /// Evenly spaced between the observed minimum and maximum
    Uniform,
}

/// Configuration for variable grids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Maximum number of grid values per numeric variable
    pub grid_points: usize,

    /// Layout of numeric grids
    pub split_type: SplitType,

    /// Also place the explained observations' own values on the grid
    pub include_observation_values: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            grid_points: 101,
            split_type: SplitType::Quantiles,
            include_observation_values: false,
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid_points(mut self, grid_points: usize) -> Self {
        self.grid_points = grid_points;
        self
    }

    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    pub fn with_observation_values(mut self, include: bool) -> Self {
        self.include_observation_values = include;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.grid_points == 0 {
            return Err(ProfileError::InvalidParameter {
                name: "grid_points".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Aggregation policy for collapsing ceteris paribus profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    /// Plain mean over observations
    Partial,
    /// Kernel-weighted mean around each observation's own value
    Conditional,
    /// Accumulated local effects, centered
    Accumulated,
}

impl FromStr for AggregationType {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partial" => Ok(AggregationType::Partial),
            "conditional" => Ok(AggregationType::Conditional),
            "accumulated" => Ok(AggregationType::Accumulated),
            other => Err(ProfileError::InvalidInput(format!(
                "unsupported aggregation type '{}' (expected partial, conditional or accumulated)",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Partial => "partial",
            AggregationType::Conditional => "conditional",
            AggregationType::Accumulated => "accumulated",
        };
        write!(f, "{}", name)
    }
}

/// Restricts aggregation to one kind of variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Numerical,
    Categorical,
}

/// Configuration for profile aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Aggregation policy
    pub aggregation_type: AggregationType,

    /// Kernel bandwidth as a fraction of the variable's standard deviation
    /// (conditional aggregation only)
    pub span: f64,

    /// Categorical observation column to aggregate separately per level
    pub groups: Option<String>,

    /// Subtract each curve's mean (partial and conditional only;
    /// accumulated curves are always centered)
    pub center: bool,

    /// Only aggregate variables of this kind
    pub variable_type: Option<VariableType>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            aggregation_type: AggregationType::Partial,
            span: 0.25,
            groups: None,
            center: false,
            variable_type: None,
        }
    }
}

impl AggregationConfig {
    pub fn new(aggregation_type: AggregationType) -> Self {
        Self {
            aggregation_type,
            ..Self::default()
        }
    }

    pub fn with_span(mut self, span: f64) -> Self {
        self.span = span;
        self
    }

    pub fn with_groups(mut self, column: impl Into<String>) -> Self {
        self.groups = Some(column.into());
        self
    }

    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    pub fn with_variable_type(mut self, variable_type: VariableType) -> Self {
        self.variable_type = Some(variable_type);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.span.is_finite() && self.span > 0.0) {
            return Err(ProfileError::InvalidParameter {
                name: "span".to_string(),
                value: self.span.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_config() {
        let config = SplitConfig::default();
        assert_eq!(config.grid_points, 101);
        assert_eq!(config.split_type, SplitType::Quantiles);
        assert!(!config.include_observation_values);
    }

    #[test]
    fn test_zero_grid_points_rejected() {
        let config = SplitConfig::new().with_grid_points(0);
        assert!(matches!(
            config.validate(),
            Err(ProfileError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_aggregation_type_from_str() {
        assert_eq!("partial".parse::<AggregationType>().unwrap(), AggregationType::Partial);
        assert_eq!(" Accumulated ".parse::<AggregationType>().unwrap(), AggregationType::Accumulated);
        assert!(matches!(
            "marginal".parse::<AggregationType>(),
            Err(ProfileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_builder_pattern() {
        let config = AggregationConfig::new(AggregationType::Conditional)
            .with_span(0.5)
            .with_groups("city")
            .with_center(true);

        assert_eq!(config.aggregation_type, AggregationType::Conditional);
        assert_eq!(config.span, 0.5);
        assert_eq!(config.groups.as_deref(), Some("city"));
        assert!(config.center);
    }

    #[test]
    fn test_invalid_span() {
        let config = AggregationConfig::default().with_span(-1.0);
        assert!(config.validate().is_err());
    }
}
