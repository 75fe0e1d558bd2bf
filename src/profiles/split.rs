//! Variable grids

use super::config::{SplitConfig, SplitType};
use crate::data::{Column, ColumnData, ColumnKind, Dataset, Value};
use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered grid of values for one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Grid {
    /// Sorted, deduplicated numeric values
    Numeric(Vec<f64>),
    /// Levels in level order
    Categorical(Vec<String>),
}

impl Grid {
    pub fn len(&self) -> usize {
        match self {
            Grid::Numeric(values) => values.len(),
            Grid::Categorical(levels) => levels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Grid::Numeric(_) => ColumnKind::Numeric,
            Grid::Categorical(_) => ColumnKind::Categorical,
        }
    }

    /// Grid value at position `idx`
    pub fn value(&self, idx: usize) -> Value {
        match self {
            Grid::Numeric(values) => Value::Numeric(values[idx]),
            Grid::Categorical(levels) => Value::Categorical(levels[idx].clone()),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    /// Position of `value` on the grid
    pub fn position(&self, value: &Value) -> Option<usize> {
        match (self, value) {
            (Grid::Numeric(values), Value::Numeric(v)) => values.iter().position(|g| g == v),
            (Grid::Categorical(levels), Value::Categorical(s)) => {
                levels.iter().position(|l| l == s)
            }
            _ => None,
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.position(value).is_some()
    }
}

/// Grid for a named variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableGrid {
    pub variable: String,
    pub grid: Grid,
}

/// Ordered mapping from variable name to grid
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableSplit {
    grids: Vec<VariableGrid>,
}

impl VariableSplit {
    pub fn new(grids: Vec<VariableGrid>) -> Self {
        Self { grids }
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableGrid> {
        self.grids.iter()
    }

    /// Variable names in split order
    pub fn variables(&self) -> Vec<&str> {
        self.grids.iter().map(|g| g.variable.as_str()).collect()
    }

    pub fn get(&self, variable: &str) -> Option<&Grid> {
        self.grids
            .iter()
            .find(|g| g.variable == variable)
            .map(|g| &g.grid)
    }

    pub fn position(&self, variable: &str) -> Option<usize> {
        self.grids.iter().position(|g| g.variable == variable)
    }

    pub(crate) fn at(&self, idx: usize) -> &VariableGrid {
        &self.grids[idx]
    }

    /// Total number of grid values across all variables
    pub fn total_points(&self) -> usize {
        self.grids.iter().map(|g| g.grid.len()).sum()
    }
}

/// Computes representative grids from a reference dataset
#[derive(Debug, Clone, Default)]
pub struct VariableSplitter {
    config: SplitConfig,
}

impl VariableSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn with_grid_points(mut self, grid_points: usize) -> Self {
        self.config.grid_points = grid_points;
        self
    }

    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.config.split_type = split_type;
        self
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Compute grids for `variables` (all columns when `None`).
    ///
    /// A numeric column with at most `grid_points` distinct finite values
    /// uses those values; otherwise `grid_points` quantiles spanning the
    /// observed range (or evenly spaced values, see [`SplitType`]),
    /// deduplicated. A categorical column uses the levels that occur in the
    /// data, in level order.
    pub fn split<S: AsRef<str>>(
        &self,
        data: &Dataset,
        variables: Option<&[S]>,
    ) -> Result<VariableSplit> {
        self.split_inner(data, variables, None)
    }

    /// Like [`split`](Self::split), additionally placing the values of
    /// `observations` on each grid when the config asks for it.
    pub fn split_for<S: AsRef<str>>(
        &self,
        data: &Dataset,
        variables: Option<&[S]>,
        observations: &Dataset,
    ) -> Result<VariableSplit> {
        if self.config.include_observation_values {
            self.split_inner(data, variables, Some(observations))
        } else {
            self.split_inner(data, variables, None)
        }
    }

    fn split_inner<S: AsRef<str>>(
        &self,
        data: &Dataset,
        variables: Option<&[S]>,
        observations: Option<&Dataset>,
    ) -> Result<VariableSplit> {
        self.config.validate()?;
        if data.is_empty() {
            return Err(ProfileError::InvalidInput(
                "reference dataset is empty".to_string(),
            ));
        }
        let indices = data.schema().resolve(variables)?;

        let mut grids = Vec::with_capacity(indices.len());
        for idx in indices {
            let column = data.column_at(idx);
            let extra = match observations {
                Some(obs) => Some(obs.column(column.name())?),
                None => None,
            };
            let grid = match column.data() {
                ColumnData::Numeric(_) => Grid::Numeric(self.numeric_grid(column, extra)?),
                ColumnData::Categorical { levels, codes } => {
                    Grid::Categorical(categorical_grid(levels, codes, extra)?)
                }
            };
            debug!(variable = column.name(), grid_size = grid.len(), "Computed variable grid");
            grids.push(VariableGrid {
                variable: column.name().to_string(),
                grid,
            });
        }

        Ok(VariableSplit::new(grids))
    }

    fn numeric_grid(&self, column: &Column, extra: Option<&Column>) -> Result<Vec<f64>> {
        let mut sorted: Vec<f64> = column
            .as_numeric()
            .map(|values| values.iter().copied().filter(|v| v.is_finite()).collect())
            .unwrap_or_default();
        if sorted.is_empty() {
            return Err(ProfileError::InvalidInput(format!(
                "column '{}' has no finite values",
                column.name()
            )));
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut distinct = sorted.clone();
        distinct.dedup();

        let grid_points = self.config.grid_points;
        let mut grid = if distinct.len() <= grid_points {
            distinct
        } else {
            match self.config.split_type {
                SplitType::Quantiles => probabilities(grid_points)
                    .map(|p| quantile_sorted(&sorted, p))
                    .collect(),
                SplitType::Uniform => {
                    let (low, high) = (sorted[0], sorted[sorted.len() - 1]);
                    probabilities(grid_points)
                        .map(|p| low + p * (high - low))
                        .collect()
                }
            }
        };

        if let Some(extra) = extra {
            let values = extra.as_numeric().ok_or_else(|| {
                ProfileError::InvalidInput(format!(
                    "observation column '{}' is not numeric",
                    extra.name()
                ))
            })?;
            grid.extend(values.iter().copied().filter(|v| v.is_finite()));
        }

        grid.sort_by(|a, b| a.total_cmp(b));
        grid.dedup();
        Ok(grid)
    }
}

fn categorical_grid(
    levels: &[String],
    codes: &[usize],
    extra: Option<&Column>,
) -> Result<Vec<String>> {
    let mut seen = vec![false; levels.len()];
    for &code in codes {
        seen[code] = true;
    }
    let mut grid: Vec<String> = levels
        .iter()
        .zip(seen)
        .filter(|(_, seen)| *seen)
        .map(|(level, _)| level.clone())
        .collect();

    if let Some(extra) = extra {
        if extra.kind() != ColumnKind::Categorical {
            return Err(ProfileError::InvalidInput(format!(
                "observation column '{}' is not categorical",
                extra.name()
            )));
        }
        for row in 0..extra.len() {
            if let Value::Categorical(level) = extra.value(row) {
                if !grid.contains(&level) {
                    grid.push(level);
                }
            }
        }
    }

    Ok(grid)
}

/// Evenly spaced probabilities on [0, 1]
fn probabilities(n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(move |i| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 })
}

/// Linear-interpolation quantile of sorted data (Hyndman-Fan type 7)
pub(crate) fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Dataset {
        Dataset::new(vec![
            Column::numeric("age", vec![5.0, 10.0, 40.0, 70.0]),
            Column::categorical("city", &["oslo", "paris", "oslo", "rome"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_distinct_values_used_when_few() {
        let split = VariableSplitter::new()
            .with_grid_points(4)
            .split(&data(), Some(&["age"][..]))
            .unwrap();
        assert_eq!(split.get("age"), Some(&Grid::Numeric(vec![5.0, 10.0, 40.0, 70.0])));
    }

    #[test]
    fn test_quantile_grid_spans_range() {
        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let ds = Dataset::new(vec![Column::numeric("x", values)]).unwrap();
        let split = VariableSplitter::new()
            .with_grid_points(5)
            .split::<&str>(&ds, None)
            .unwrap();
        assert_eq!(split.get("x"), Some(&Grid::Numeric(vec![0.0, 25.0, 50.0, 75.0, 100.0])));
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 8.0);
    }

    #[test]
    fn test_uniform_grid() {
        let ds = Dataset::new(vec![Column::numeric("x", vec![0.0, 1.0, 3.0, 9.0, 10.0])]).unwrap();
        let split = VariableSplitter::new()
            .with_grid_points(3)
            .with_split_type(SplitType::Uniform)
            .split::<&str>(&ds, None)
            .unwrap();
        assert_eq!(split.get("x"), Some(&Grid::Numeric(vec![0.0, 5.0, 10.0])));
    }

    #[test]
    fn test_nan_ignored() {
        let ds = Dataset::new(vec![Column::numeric("x", vec![f64::NAN, 2.0, 1.0])]).unwrap();
        let split = VariableSplitter::new().split::<&str>(&ds, None).unwrap();
        assert_eq!(split.get("x"), Some(&Grid::Numeric(vec![1.0, 2.0])));
    }

    #[test]
    fn test_all_nan_column_rejected() {
        let ds = Dataset::new(vec![Column::numeric("x", vec![f64::NAN])]).unwrap();
        assert!(matches!(
            VariableSplitter::new().split::<&str>(&ds, None),
            Err(ProfileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_categorical_levels_in_level_order() {
        let col = Column::categorical_with_levels(
            "size",
            vec!["small".into(), "medium".into(), "large".into()],
            &["large", "small", "large"],
        )
        .unwrap();
        let ds = Dataset::new(vec![col]).unwrap();
        let split = VariableSplitter::new().split::<&str>(&ds, None).unwrap();
        assert_eq!(
            split.get("size"),
            Some(&Grid::Categorical(vec!["small".into(), "large".into()]))
        );
    }

    #[test]
    fn test_first_seen_order() {
        let split = VariableSplitter::new().split(&data(), Some(&["city"][..])).unwrap();
        assert_eq!(
            split.get("city"),
            Some(&Grid::Categorical(vec!["oslo".into(), "paris".into(), "rome".into()]))
        );
    }

    #[test]
    fn test_unknown_variable() {
        let err = VariableSplitter::new()
            .split(&data(), Some(&["height"][..]))
            .unwrap_err();
        assert!(matches!(err, ProfileError::FeatureNotFound(_)));
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::new(vec![Column::numeric("x", Vec::<f64>::new())]).unwrap();
        assert!(matches!(
            VariableSplitter::new().split::<&str>(&ds, None),
            Err(ProfileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_observation_values_added() {
        let obs = Dataset::new(vec![
            Column::numeric("age", vec![33.0]),
            Column::categorical("city", &["lima"]),
        ])
        .unwrap();
        let splitter = VariableSplitter::with_config(
            SplitConfig::new().with_grid_points(4).with_observation_values(true),
        );
        let split = splitter.split_for::<&str>(&data(), None, &obs).unwrap();
        assert_eq!(split.get("age"), Some(&Grid::Numeric(vec![5.0, 10.0, 33.0, 40.0, 70.0])));
        assert!(split.get("city").unwrap().contains(&Value::from("lima")));
    }

    #[test]
    fn test_split_is_deterministic() {
        let splitter = VariableSplitter::new().with_grid_points(3);
        let a = splitter.split::<&str>(&data(), None).unwrap();
        let b = splitter.split::<&str>(&data(), None).unwrap();
        assert_eq!(a, b);
    }
}
