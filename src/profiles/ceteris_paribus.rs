//! Ceteris paribus (what-if) profiles

use super::aggregate::{AggregatedCurve, ProfileAggregator};
use super::config::SplitConfig;
use super::split::{VariableSplit, VariableSplitter};
use crate::data::{ColumnBuilder, Dataset, Value};
use crate::error::{ProfileError, Result};
use crate::model::{predict_batch, Predict};
use crate::sampling::select_sample;
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label used when the caller does not name the model
pub const DEFAULT_LABEL: &str = "model";

/// One scored synthetic observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Row position of the originating observation
    pub id: usize,
    /// Variable that was varied
    pub variable: String,
    /// Grid value the variable was set to
    pub value: Value,
    /// Full feature vector, in observation column order
    pub features: Vec<Value>,
    /// Model prediction
    pub yhat: f64,
    /// Model label
    pub label: String,
}

/// Scored ceteris paribus profiles for a set of observations.
///
/// Rows are ordered observations outer, variables middle, grid values inner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileTable {
    label: String,
    splits: VariableSplit,
    observations: Dataset,
    observation_yhat: Array1<f64>,
    features: Dataset,
    ids: Vec<usize>,
    variables: Vec<usize>,
    grid_positions: Vec<usize>,
    yhat: Array1<f64>,
}

impl ProfileTable {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Grids the profiles were computed on
    pub fn splits(&self) -> &VariableSplit {
        &self.splits
    }

    /// The explained observations
    pub fn observations(&self) -> &Dataset {
        &self.observations
    }

    /// Model predictions for the explained observations themselves
    pub fn observation_predictions(&self) -> &Array1<f64> {
        &self.observation_yhat
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Synthetic feature vectors as a table
    pub fn features(&self) -> &Dataset {
        &self.features
    }

    /// Predictions for every synthetic row
    pub fn predictions(&self) -> &Array1<f64> {
        &self.yhat
    }

    pub(crate) fn id(&self, row: usize) -> usize {
        self.ids[row]
    }

    pub(crate) fn variable_position(&self, row: usize) -> usize {
        self.variables[row]
    }

    pub(crate) fn grid_position(&self, row: usize) -> usize {
        self.grid_positions[row]
    }

    pub fn row(&self, row: usize) -> ProfileRow {
        let grid = self.splits.at(self.variables[row]);
        ProfileRow {
            id: self.ids[row],
            variable: grid.variable.clone(),
            value: grid.grid.value(self.grid_positions[row]),
            features: self.features.row(row),
            yhat: self.yhat[row],
            label: self.label.clone(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = ProfileRow> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }

    /// Flat JSON array of profile rows
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.rows().collect::<Vec<_>>())?)
    }
}

/// Builds and scores ceteris paribus profiles
pub struct ProfileBuilder<M>
where
    M: Predict,
{
    model: M,
    label: String,
}

impl<M> ProfileBuilder<M>
where
    M: Predict,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn model(&self) -> &M {
        &self.model
    }

    /// Vary each split variable over its grid for every observation.
    ///
    /// All synthetic rows and the observations themselves are scored in a
    /// single model call. Model errors are returned unchanged.
    pub fn build(&self, observations: &Dataset, splits: &VariableSplit) -> Result<ProfileTable> {
        if observations.is_empty() {
            return Err(ProfileError::InvalidInput(
                "no observations to explain".to_string(),
            ));
        }
        if splits.is_empty() {
            return Err(ProfileError::InvalidInput("no variables to vary".to_string()));
        }

        // Column position in `observations` of every split variable
        let mut varied = vec![None; observations.n_cols()];
        for (split_idx, vg) in splits.iter().enumerate() {
            let col_idx = observations.column_index(&vg.variable)?;
            let kind = observations.column_at(col_idx).kind();
            if kind != vg.grid.kind() {
                return Err(ProfileError::InvalidInput(format!(
                    "variable '{}' is {} in the observations but its grid is {}",
                    vg.variable,
                    kind,
                    vg.grid.kind()
                )));
            }
            if varied[col_idx].is_some() {
                return Err(ProfileError::InvalidInput(format!(
                    "variable '{}' appears more than once in the splits",
                    vg.variable
                )));
            }
            varied[col_idx] = Some(split_idx);
        }

        let n_obs = observations.n_rows();
        let n_profile = n_obs * splits.total_points();

        let mut ids = Vec::with_capacity(n_profile);
        let mut variables = Vec::with_capacity(n_profile);
        let mut grid_positions = Vec::with_capacity(n_profile);
        for obs in 0..n_obs {
            for (split_idx, vg) in splits.iter().enumerate() {
                for pos in 0..vg.grid.len() {
                    ids.push(obs);
                    variables.push(split_idx);
                    grid_positions.push(pos);
                }
            }
        }

        let mut columns = Vec::with_capacity(observations.n_cols());
        for (col_idx, column) in observations.columns().iter().enumerate() {
            let mut builder = ColumnBuilder::like(column, n_profile + n_obs);
            for row in 0..n_profile {
                match varied[col_idx] {
                    Some(split_idx) if variables[row] == split_idx => {
                        builder.push(&splits.at(split_idx).grid.value(grid_positions[row]))?;
                    }
                    _ => builder.push_from(column, ids[row])?,
                }
            }
            for obs in 0..n_obs {
                builder.push_from(column, obs)?;
            }
            columns.push(builder.finish(column.name()));
        }
        let batch = Dataset::new(columns)?;

        debug!(
            label = %self.label,
            observations = n_obs,
            variables = splits.len(),
            rows = n_profile,
            "Scoring ceteris paribus profiles"
        );
        let predictions = predict_batch(&self.model, &batch)?;

        let profile_rows: Vec<usize> = (0..n_profile).collect();
        Ok(ProfileTable {
            label: self.label.clone(),
            splits: splits.clone(),
            observations: observations.clone(),
            observation_yhat: predictions.slice(s![n_profile..]).to_owned(),
            features: batch.take(&profile_rows),
            ids,
            variables,
            grid_positions,
            yhat: predictions.slice(s![..n_profile]).to_owned(),
        })
    }
}

/// Ceteris paribus explainer bound to a model and a reference dataset
pub struct CeterisParibus<M>
where
    M: Predict,
{
    builder: ProfileBuilder<M>,
    data: Dataset,
    splitter: VariableSplitter,
    sample_size: Option<usize>,
    seed: Option<u64>,
}

impl<M> CeterisParibus<M>
where
    M: Predict,
{
    /// Create an explainer; `data` is the reference dataset grids are
    /// derived from
    pub fn new(model: M, data: Dataset) -> Self {
        Self {
            builder: ProfileBuilder::new(model),
            data,
            splitter: VariableSplitter::new(),
            sample_size: None,
            seed: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.builder = self.builder.with_label(label);
        self
    }

    pub fn with_grid_points(mut self, grid_points: usize) -> Self {
        self.splitter = self.splitter.with_grid_points(grid_points);
        self
    }

    pub fn with_split_config(mut self, config: SplitConfig) -> Self {
        self.splitter = VariableSplitter::with_config(config);
        self
    }

    /// Number of reference rows profiled by [`dependence`](Self::dependence)
    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn label(&self) -> &str {
        self.builder.label()
    }

    pub(crate) fn builder(&self) -> &ProfileBuilder<M> {
        &self.builder
    }

    pub(crate) fn splitter(&self) -> &VariableSplitter {
        &self.splitter
    }

    /// Profiles for `observations` over `variables` (every reference
    /// column when `None`).
    pub fn explain<S: AsRef<str>>(
        &self,
        observations: &Dataset,
        variables: Option<&[S]>,
    ) -> Result<ProfileTable> {
        let observations = observations.conform_to(&self.data)?;
        let splits = self.splitter.split_for(&self.data, variables, &observations)?;
        self.builder.build(&observations, &splits)
    }

    /// Aggregated dependence curves over a sample of the reference data.
    ///
    /// Profiles are built for `sample_size` reference rows (all rows when
    /// unset) and collapsed with `aggregator`. The aggregator's settings are
    /// checked against the grids before the model is called.
    pub fn dependence<S: AsRef<str>>(
        &self,
        aggregator: &ProfileAggregator,
        variables: Option<&[S]>,
    ) -> Result<AggregatedCurve> {
        aggregator.validate()?;
        let sample = match self.sample_size {
            Some(n) => select_sample(&self.data, n, self.seed)?,
            None => self.data.clone(),
        };
        let splits = self.splitter.split_for(&self.data, variables, &sample)?;
        aggregator.check_inputs::<&str>(&splits, &sample, self.label(), None)?;
        let table = self.builder.build(&sample, &splits)?;
        aggregator.aggregate::<&str>(&table, None)
    }
}
