//! Aggregation of ceteris paribus profiles into dependence curves
//!
//! Three policies are supported:
//! - partial: mean prediction over all observations at each grid value
//! - conditional: kernel-weighted mean, weighting each observation by how
//!   close its own value of the variable is to the grid value
//! - accumulated: accumulated local effects, centered on zero
//!
//! Grid values without support are never dropped silently. A partial or
//! conditional grid value whose total weight is zero is left out of the
//! curve; an accumulated interval that contains no observation carries the
//! previous value forward. Both cases are listed in
//! [`AggregatedCurve::unsupported`].

use super::ceteris_paribus::ProfileTable;
use super::config::{AggregationConfig, AggregationType, VariableType};
use super::split::{Grid, VariableSplit};
use crate::data::{ColumnData, ColumnKind, Dataset, Value};
use crate::error::{ProfileError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One point of an aggregated curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub variable: String,
    pub value: Value,
    pub yhat: f64,
    /// Observations contributing to this point
    pub n_obs: usize,
    pub label: String,
    /// Level of the grouping column, when aggregating by groups
    pub group: Option<String>,
}

/// What happened to a grid value without support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapHandling {
    /// Left out of the curve
    Omitted,
    /// Curve value carried forward from the previous grid value
    CarriedForward,
}

/// A grid value that had no supporting observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedPoint {
    pub variable: String,
    pub value: Value,
    pub label: String,
    pub group: Option<String>,
    pub handling: GapHandling,
}

/// Aggregated dependence curves, grouped by model, variable and group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedCurve {
    aggregation_type: AggregationType,
    points: Vec<AggregatedPoint>,
    unsupported: Vec<UnsupportedPoint>,
}

impl AggregatedCurve {
    pub fn aggregation_type(&self) -> AggregationType {
        self.aggregation_type
    }

    pub fn points(&self) -> &[AggregatedPoint] {
        &self.points
    }

    pub fn unsupported(&self) -> &[UnsupportedPoint] {
        &self.unsupported
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Distinct variables in curve order
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for p in &self.points {
            if !names.contains(&p.variable.as_str()) {
                names.push(&p.variable);
            }
        }
        names
    }

    /// Points of one variable, across all models and groups
    pub fn curve(&self, variable: &str) -> Vec<&AggregatedPoint> {
        self.points.iter().filter(|p| p.variable == variable).collect()
    }

    /// Aggregated predictions of one variable for one model, in grid order
    pub fn yhat(&self, variable: &str, label: &str) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| p.variable == variable && p.label == label)
            .map(|p| p.yhat)
            .collect()
    }

    /// Serialize the whole curve set, points and unsupported grid values
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Collapses per-observation profiles into one curve per variable and model
#[derive(Debug, Clone, Default)]
pub struct ProfileAggregator {
    config: AggregationConfig,
}

/// Points and gaps of a single curve before labelling
struct CurveValues {
    yhat: Vec<Option<f64>>,
    n_obs: Vec<usize>,
    gaps: Vec<(usize, GapHandling)>,
}

impl ProfileAggregator {
    pub fn new(aggregation_type: AggregationType) -> Self {
        Self {
            config: AggregationConfig::new(aggregation_type),
        }
    }

    pub fn with_config(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn partial() -> Self {
        Self::new(AggregationType::Partial)
    }

    pub fn conditional() -> Self {
        Self::new(AggregationType::Conditional)
    }

    pub fn accumulated() -> Self {
        Self::new(AggregationType::Accumulated)
    }

    /// Kernel bandwidth for conditional aggregation, as a fraction of the
    /// variable's standard deviation
    pub fn with_span(mut self, span: f64) -> Self {
        self.config.span = span;
        self
    }

    pub fn with_groups(mut self, column: impl Into<String>) -> Self {
        self.config.groups = Some(column.into());
        self
    }

    pub fn with_center(mut self, center: bool) -> Self {
        self.config.center = center;
        self
    }

    pub fn with_variable_type(mut self, variable_type: VariableType) -> Self {
        self.config.variable_type = Some(variable_type);
        self
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.config.validate()
    }

    /// Aggregate one table over `variables` (every profiled variable when
    /// `None`).
    pub fn aggregate<S: AsRef<str>>(
        &self,
        table: &ProfileTable,
        variables: Option<&[S]>,
    ) -> Result<AggregatedCurve> {
        self.aggregate_many(&[table], variables)
    }

    /// Aggregate tables from several models into one curve set, in table
    /// order.
    pub fn aggregate_many<S: AsRef<str>>(
        &self,
        tables: &[&ProfileTable],
        variables: Option<&[S]>,
    ) -> Result<AggregatedCurve> {
        self.validate()?;
        if tables.is_empty() {
            return Err(ProfileError::InvalidInput(
                "no profile tables to aggregate".to_string(),
            ));
        }

        // Validate every table before aggregating any of them
        let mut selections = Vec::with_capacity(tables.len());
        for table in tables {
            selections.push(self.check_inputs(
                table.splits(),
                table.observations(),
                table.label(),
                variables,
            )?);
        }

        let mut points = Vec::new();
        let mut unsupported = Vec::new();
        for (table, selected) in tables.iter().zip(selections) {
            let groups = self.observation_groups(table)?;
            for split_idx in selected {
                let grid = &table.splits().at(split_idx).grid;
                let variable = &table.splits().at(split_idx).variable;
                let profiles = profile_matrix(table, split_idx);
                let actual = actual_positions(table, variable, grid)?;

                for (group, members) in &groups {
                    let values = match self.config.aggregation_type {
                        AggregationType::Partial => partial(&profiles, members),
                        AggregationType::Conditional => {
                            conditional(&profiles, members, grid, &actual, self.config.span)
                        }
                        AggregationType::Accumulated => accumulated(&profiles, members, grid, &actual),
                    };
                    let values = if self.config.center
                        && self.config.aggregation_type != AggregationType::Accumulated
                    {
                        center(values)
                    } else {
                        values
                    };

                    if !values.gaps.is_empty() {
                        debug!(
                            variable = %variable,
                            label = table.label(),
                            gaps = values.gaps.len(),
                            "Grid values without supporting observations"
                        );
                    }
                    for (pos, handling) in values.gaps {
                        unsupported.push(UnsupportedPoint {
                            variable: variable.clone(),
                            value: grid.value(pos),
                            label: table.label().to_string(),
                            group: group.clone(),
                            handling,
                        });
                    }
                    for (pos, yhat) in values.yhat.into_iter().enumerate() {
                        if let Some(yhat) = yhat {
                            points.push(AggregatedPoint {
                                variable: variable.clone(),
                                value: grid.value(pos),
                                yhat,
                                n_obs: values.n_obs[pos],
                                label: table.label().to_string(),
                                group: group.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(AggregatedCurve {
            aggregation_type: self.config.aggregation_type,
            points,
            unsupported,
        })
    }

    /// Check that profiles over `splits` for `observations` can be
    /// aggregated, returning the split positions to aggregate.
    pub(crate) fn check_inputs<S: AsRef<str>>(
        &self,
        splits: &VariableSplit,
        observations: &Dataset,
        label: &str,
        variables: Option<&[S]>,
    ) -> Result<Vec<usize>> {
        let selected = self.select_variables(splits, label, variables)?;
        self.check_group_column(observations)?;
        Ok(selected)
    }

    fn check_group_column(&self, observations: &Dataset) -> Result<()> {
        if let Some(column) = &self.config.groups {
            let kind = observations.column(column)?.kind();
            if kind != ColumnKind::Categorical {
                return Err(ProfileError::InvalidInput(format!(
                    "group column '{}' must be categorical",
                    column
                )));
            }
        }
        Ok(())
    }

    /// Split positions to aggregate, in split order
    fn select_variables<S: AsRef<str>>(
        &self,
        splits: &VariableSplit,
        label: &str,
        variables: Option<&[S]>,
    ) -> Result<Vec<usize>> {
        let mut selected: Vec<usize> = match variables {
            None => (0..splits.len()).collect(),
            Some(names) => {
                let mut positions = Vec::with_capacity(names.len());
                for name in names {
                    let pos = splits
                        .position(name.as_ref())
                        .ok_or_else(|| ProfileError::FeatureNotFound(name.as_ref().to_string()))?;
                    positions.push(pos);
                }
                positions.sort_unstable();
                positions.dedup();
                positions
            }
        };

        if let Some(variable_type) = self.config.variable_type {
            let wanted = match variable_type {
                VariableType::Numerical => ColumnKind::Numeric,
                VariableType::Categorical => ColumnKind::Categorical,
            };
            selected.retain(|&pos| splits.at(pos).grid.kind() == wanted);
            if selected.is_empty() {
                return Err(ProfileError::NoApplicableVariables(format!(
                    "no {} variables among the profiled variables of '{}'",
                    wanted, label
                )));
            }
        }

        Ok(selected)
    }

    /// Observation ids per group, groups in level order
    fn observation_groups(&self, table: &ProfileTable) -> Result<Vec<(Option<String>, Vec<usize>)>> {
        let n_obs = table.observations().n_rows();
        let column = match &self.config.groups {
            None => return Ok(vec![(None, (0..n_obs).collect())]),
            Some(name) => table.observations().column(name)?,
        };
        let (levels, codes) = match column.data() {
            ColumnData::Categorical { levels, codes } => (levels, codes),
            ColumnData::Numeric(_) => {
                return Err(ProfileError::InvalidInput(format!(
                    "group column '{}' must be categorical",
                    column.name()
                )))
            }
        };

        Ok(levels
            .iter()
            .enumerate()
            .map(|(code, level)| {
                let members: Vec<usize> = (0..n_obs).filter(|&i| codes[i] == code).collect();
                (Some(level.clone()), members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect())
    }
}

/// Predictions of one variable's profiles, shape (observations, grid values)
fn profile_matrix(table: &ProfileTable, split_idx: usize) -> Array2<f64> {
    let n_obs = table.observations().n_rows();
    let n_grid = table.splits().at(split_idx).grid.len();
    let mut profiles = Array2::from_elem((n_obs, n_grid), f64::NAN);
    for row in 0..table.len() {
        if table.variable_position(row) == split_idx {
            profiles[[table.id(row), table.grid_position(row)]] = table.predictions()[row];
        }
    }
    profiles
}

/// Where each observation's own value of the variable sits
enum ActualPositions {
    /// Raw numeric values (NaN when missing)
    Numeric(Vec<f64>),
    /// Grid position of each observation's level
    Categorical(Vec<Option<usize>>),
}

fn actual_positions(table: &ProfileTable, variable: &str, grid: &Grid) -> Result<ActualPositions> {
    let column = table.observations().column(variable)?;
    Ok(match column.data() {
        ColumnData::Numeric(values) => ActualPositions::Numeric(values.to_vec()),
        ColumnData::Categorical { .. } => ActualPositions::Categorical(
            (0..column.len())
                .map(|i| grid.position(&column.value(i)))
                .collect(),
        ),
    })
}

fn partial(profiles: &Array2<f64>, members: &[usize]) -> CurveValues {
    let n_grid = profiles.ncols();
    let mut yhat = vec![None; n_grid];
    let mut n_obs = vec![0; n_grid];
    let mut gaps = Vec::new();

    for k in 0..n_grid {
        let values: Vec<f64> = members
            .iter()
            .map(|&i| profiles[[i, k]])
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            gaps.push((k, GapHandling::Omitted));
            continue;
        }
        yhat[k] = Some(values.iter().sum::<f64>() / values.len() as f64);
        n_obs[k] = values.len();
    }

    CurveValues { yhat, n_obs, gaps }
}

fn conditional(
    profiles: &Array2<f64>,
    members: &[usize],
    grid: &Grid,
    actual: &ActualPositions,
    span: f64,
) -> CurveValues {
    let n_grid = profiles.ncols();
    let mut yhat = vec![None; n_grid];
    let mut n_obs = vec![0; n_grid];
    let mut gaps = Vec::new();

    let weight: Box<dyn Fn(usize, usize) -> f64> = match (grid, actual) {
        (Grid::Numeric(points), ActualPositions::Numeric(x)) => {
            let finite: Vec<f64> = members.iter().map(|&i| x[i]).filter(|v| v.is_finite()).collect();
            let bandwidth = span * sample_std(&finite);
            let points = points.clone();
            let x = x.clone();
            Box::new(move |i: usize, k: usize| {
                if !x[i].is_finite() {
                    0.0
                } else if bandwidth > 0.0 {
                    let z = (points[k] - x[i]) / bandwidth;
                    (-0.5 * z * z).exp()
                } else {
                    1.0
                }
            })
        }
        (_, ActualPositions::Categorical(pos)) => {
            let pos = pos.clone();
            Box::new(move |i: usize, k: usize| if pos[i] == Some(k) { 1.0 } else { 0.0 })
        }
        (Grid::Categorical(_), ActualPositions::Numeric(_)) => Box::new(|_: usize, _: usize| 0.0),
    };

    for k in 0..n_grid {
        let mut total_weight = 0.0;
        let mut weighted = 0.0;
        let mut count = 0;
        for &i in members {
            let y = profiles[[i, k]];
            let w = weight(i, k);
            if w > 0.0 && !y.is_nan() {
                total_weight += w;
                weighted += w * y;
                count += 1;
            }
        }
        if total_weight > 0.0 {
            yhat[k] = Some(weighted / total_weight);
            n_obs[k] = count;
        } else {
            gaps.push((k, GapHandling::Omitted));
        }
    }

    CurveValues { yhat, n_obs, gaps }
}

fn accumulated(
    profiles: &Array2<f64>,
    members: &[usize],
    grid: &Grid,
    actual: &ActualPositions,
) -> CurveValues {
    let n_grid = profiles.ncols();

    // Interval (g[k-1], g[k]] each observation falls in, and its nearest grid value
    let mut interval_of: Vec<(usize, usize, usize)> = Vec::with_capacity(members.len());
    for &i in members {
        let located = match (grid, actual) {
            (Grid::Numeric(points), ActualPositions::Numeric(x)) if x[i].is_finite() => {
                Some((numeric_interval(points, x[i]), nearest(points, x[i])))
            }
            (_, ActualPositions::Categorical(pos)) => {
                pos[i].map(|p| (p.max(1).min(n_grid.saturating_sub(1)), p))
            }
            _ => None,
        };
        if let Some((interval, bucket)) = located {
            interval_of.push((i, interval, bucket));
        }
    }

    let mut effect_sum = vec![0.0; n_grid];
    let mut effect_count = vec![0usize; n_grid];
    let mut occupancy = vec![0usize; n_grid];
    for &(i, interval, bucket) in &interval_of {
        occupancy[bucket] += 1;
        if interval >= 1 {
            let diff = profiles[[i, interval]] - profiles[[i, interval - 1]];
            if !diff.is_nan() {
                effect_sum[interval] += diff;
                effect_count[interval] += 1;
            }
        }
    }

    let mut curve = vec![0.0; n_grid];
    let mut gaps = Vec::new();
    for k in 1..n_grid {
        curve[k] = if effect_count[k] > 0 {
            curve[k - 1] + effect_sum[k] / effect_count[k] as f64
        } else {
            gaps.push((k, GapHandling::CarriedForward));
            curve[k - 1]
        };
    }

    let total: usize = occupancy.iter().sum();
    if total == 0 {
        return CurveValues {
            yhat: vec![None; n_grid],
            n_obs: occupancy,
            gaps: (0..n_grid).map(|k| (k, GapHandling::Omitted)).collect(),
        };
    }
    let mean = curve
        .iter()
        .zip(&occupancy)
        .map(|(c, &n)| c * n as f64)
        .sum::<f64>()
        / total as f64;

    CurveValues {
        yhat: curve.into_iter().map(|c| Some(c - mean)).collect(),
        n_obs: occupancy,
        gaps,
    }
}

/// Subtract the mean of the defined points
fn center(mut values: CurveValues) -> CurveValues {
    let defined: Vec<f64> = values.yhat.iter().flatten().copied().collect();
    if defined.is_empty() {
        return values;
    }
    let mean = defined.iter().sum::<f64>() / defined.len() as f64;
    for y in values.yhat.iter_mut().flatten() {
        *y -= mean;
    }
    values
}

/// Position k of the interval (g[k-1], g[k]] containing `x`; values below
/// the grid fall in the first interval, values above it in the last
fn numeric_interval(points: &[f64], x: f64) -> usize {
    if points.len() < 2 {
        return 0;
    }
    points
        .iter()
        .position(|&g| x <= g)
        .unwrap_or(points.len() - 1)
        .max(1)
}

/// Grid position nearest to `x`; ties go to the lower grid value
fn nearest(points: &[f64], x: f64) -> usize {
    let mut best = 0;
    for (k, g) in points.iter().enumerate() {
        if (g - x).abs() < (points[best] - x).abs() {
            best = k;
        }
    }
    best
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}
