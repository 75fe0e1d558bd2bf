//! Permutation variable importance

use super::config::{ImportanceConfig, ImportanceType};
use super::loss::loss_root_mean_square;
use crate::data::Dataset;
use crate::error::{ProfileError, Result};
use crate::model::{predict_batch, Predict};
use crate::profiles::DEFAULT_LABEL;
use ndarray::{Array1, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Record name carrying the unpermuted model loss
pub const FULL_MODEL: &str = "_full_model_";
/// Record name carrying the loss of a constant predictor at mean(y)
pub const BASELINE: &str = "_baseline_";

/// Importance of one variable (or variable group)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRecord {
    pub variable: String,
    /// Mean loss over the permutation rounds
    pub mean_loss: f64,
    /// Score derived from `mean_loss`; sentinel records carry the raw loss
    pub importance: f64,
    /// Standard deviation of the per-round scores
    pub std: f64,
    /// Loss of every permutation round, in round order
    pub permutation_losses: Vec<f64>,
    pub label: String,
}

impl ImportanceRecord {
    /// Whether this is one of the `_full_model_` / `_baseline_` rows
    pub fn is_sentinel(&self) -> bool {
        self.variable == FULL_MODEL || self.variable == BASELINE
    }
}

/// Result of a permutation importance run.
///
/// Records are `_full_model_` first, then variables by descending
/// importance, then `_baseline_`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceResult {
    pub label: String,
    pub importance_type: ImportanceType,
    pub full_model_loss: f64,
    pub baseline_loss: f64,
    pub records: Vec<ImportanceRecord>,
}

impl ImportanceResult {
    /// Record by variable (or group) name
    pub fn get(&self, variable: &str) -> Option<&ImportanceRecord> {
        self.records.iter().find(|r| r.variable == variable)
    }

    /// Variable names by descending importance, without sentinels
    pub fn variables(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.is_sentinel())
            .map(|r| r.variable.as_str())
            .collect()
    }

    /// Get top k important variables
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        self.records
            .iter()
            .filter(|r| !r.is_sentinel())
            .take(k)
            .map(|r| (r.variable.as_str(), r.importance))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }
}

/// Columns permuted together under one record name
struct Target {
    name: String,
    columns: Vec<usize>,
}

/// Permutation importance calculator
pub struct PermutationImportance<M>
where
    M: Predict,
{
    model: M,
    label: String,
    config: ImportanceConfig,
    variable_groups: Option<Vec<(String, Vec<String>)>>,
}

impl<M> PermutationImportance<M>
where
    M: Predict,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            label: DEFAULT_LABEL.to_string(),
            config: ImportanceConfig::default(),
            variable_groups: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_config(mut self, config: ImportanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set number of permutation rounds
    pub fn with_n_permutations(mut self, n_permutations: usize) -> Self {
        self.config = self.config.with_n_permutations(n_permutations);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config = self.config.with_seed(seed);
        self
    }

    /// Rows drawn for each round
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.config = self.config.with_sample_size(sample_size);
        self
    }

    pub fn with_type(mut self, importance_type: ImportanceType) -> Self {
        self.config = self.config.with_type(importance_type);
        self
    }

    /// Permute named groups of columns jointly, one record per group.
    /// Groups take precedence over the `variables` argument of `compute`.
    pub fn with_variable_groups<S: Into<String>>(mut self, groups: Vec<(S, Vec<S>)>) -> Self {
        self.variable_groups = Some(
            groups
                .into_iter()
                .map(|(name, members)| (name.into(), members.into_iter().map(Into::into).collect()))
                .collect(),
        );
        self
    }

    pub fn config(&self) -> &ImportanceConfig {
        &self.config
    }

    /// Compute permutation importance with root mean square loss
    pub fn compute<S: AsRef<str>>(
        &self,
        data: &Dataset,
        y: &Array1<f64>,
        variables: Option<&[S]>,
    ) -> Result<ImportanceResult> {
        self.compute_with_loss(data, y, variables, loss_root_mean_square)
    }

    /// Compute permutation importance with a custom loss
    /// `loss(observed, predicted)`. Loss errors are returned unchanged.
    pub fn compute_with_loss<S, L>(
        &self,
        data: &Dataset,
        y: &Array1<f64>,
        variables: Option<&[S]>,
        loss: L,
    ) -> Result<ImportanceResult>
    where
        S: AsRef<str>,
        L: Fn(&Array1<f64>, &Array1<f64>) -> Result<f64>,
    {
        self.config.validate()?;
        if data.is_empty() {
            return Err(ProfileError::InvalidInput("dataset is empty".to_string()));
        }
        if y.len() != data.n_rows() {
            return Err(ProfileError::shape(
                format!("{} target values", data.n_rows()),
                y.len(),
            ));
        }
        let targets = self.targets(data, variables)?;

        let n_rows = data.n_rows();
        let n_permutations = self.config.n_permutations;
        let sample_size = self.config.sample_size.filter(|&n| n < n_rows);
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Without subsampling the unpermuted losses are the same every round
        let fixed = match sample_size {
            Some(_) => None,
            None => Some(self.reference_losses(data, y, &loss)?),
        };

        let mut full_losses = Vec::with_capacity(n_permutations);
        let mut baseline_losses = Vec::with_capacity(n_permutations);
        let mut permuted_losses: Vec<Vec<f64>> = vec![Vec::with_capacity(n_permutations); targets.len()];
        let mut scores: Vec<Vec<f64>> = vec![Vec::with_capacity(n_permutations); targets.len()];

        for round in 0..n_permutations {
            let sampled;
            let (rows, y_rows) = match sample_size {
                Some(n) => {
                    let mut indices = rand::seq::index::sample(&mut rng, n_rows, n).into_vec();
                    indices.sort_unstable();
                    sampled = (data.take(&indices), y.select(Axis(0), &indices));
                    (&sampled.0, &sampled.1)
                }
                None => (data, y),
            };
            let (full_loss, baseline_loss) = match fixed {
                Some(losses) => losses,
                None => self.reference_losses(rows, y_rows, &loss)?,
            };
            full_losses.push(full_loss);
            baseline_losses.push(baseline_loss);

            for (t, target) in targets.iter().enumerate() {
                let mut permutation: Vec<usize> = (0..rows.n_rows()).collect();
                permutation.shuffle(&mut rng);

                let mut permuted = rows.clone();
                for &col_idx in &target.columns {
                    let column = rows.column_at(col_idx).take(&permutation);
                    permuted = permuted.with_column(col_idx, column)?;
                }

                let predictions = predict_batch(&self.model, &permuted)?;
                let permuted_loss = loss(y_rows, &predictions)?;
                permuted_losses[t].push(permuted_loss);
                scores[t].push(self.config.importance_type.score(permuted_loss, full_loss));
            }
            debug!(round, full_loss, "Permutation round complete");
        }

        let full_model_loss = mean(&full_losses);
        let baseline_loss = mean(&baseline_losses);

        let mut records: Vec<ImportanceRecord> = targets
            .iter()
            .zip(permuted_losses)
            .zip(&scores)
            .map(|((target, losses), round_scores)| {
                let mean_loss = mean(&losses);
                ImportanceRecord {
                    variable: target.name.clone(),
                    mean_loss,
                    importance: self.config.importance_type.score(mean_loss, full_model_loss),
                    std: std_dev(round_scores),
                    permutation_losses: losses,
                    label: self.label.clone(),
                }
            })
            .collect();
        records.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        records.insert(0, self.sentinel(FULL_MODEL, full_losses));
        records.push(self.sentinel(BASELINE, baseline_losses));

        info!(
            label = %self.label,
            variables = targets.len(),
            n_permutations,
            full_model_loss,
            baseline_loss,
            "Permutation importance complete"
        );

        Ok(ImportanceResult {
            label: self.label.clone(),
            importance_type: self.config.importance_type,
            full_model_loss,
            baseline_loss,
            records,
        })
    }

    fn targets<S: AsRef<str>>(&self, data: &Dataset, variables: Option<&[S]>) -> Result<Vec<Target>> {
        let schema = data.schema();
        match &self.variable_groups {
            Some(groups) => {
                if groups.is_empty() {
                    return Err(ProfileError::InvalidInput("no variable groups given".to_string()));
                }
                groups
                    .iter()
                    .map(|(name, members)| {
                        if members.is_empty() {
                            return Err(ProfileError::InvalidInput(format!(
                                "variable group '{}' is empty",
                                name
                            )));
                        }
                        Ok(Target {
                            name: name.clone(),
                            columns: schema.resolve(Some(members.as_slice()))?,
                        })
                    })
                    .collect()
            }
            None => Ok(schema
                .resolve(variables)?
                .into_iter()
                .map(|idx| Target {
                    name: data.column_at(idx).name().to_string(),
                    columns: vec![idx],
                })
                .collect()),
        }
    }

    /// Loss of the unpermuted model and of a constant mean(y) predictor
    fn reference_losses<L>(&self, rows: &Dataset, y: &Array1<f64>, loss: &L) -> Result<(f64, f64)>
    where
        L: Fn(&Array1<f64>, &Array1<f64>) -> Result<f64>,
    {
        let predictions = predict_batch(&self.model, rows)?;
        let full = loss(y, &predictions)?;
        let constant = Array1::from_elem(y.len(), y.mean().unwrap_or(0.0));
        let baseline = loss(y, &constant)?;
        Ok((full, baseline))
    }

    fn sentinel(&self, name: &str, losses: Vec<f64>) -> ImportanceRecord {
        let mean_loss = mean(&losses);
        ImportanceRecord {
            variable: name.to_string(),
            mean_loss,
            importance: mean_loss,
            std: std_dev(&losses),
            permutation_losses: losses,
            label: self.label.clone(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::importance::loss_mean_absolute_error;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn data() -> (Dataset, Array1<f64>) {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let y = Array1::from(x.iter().map(|v| 3.0 * v).collect::<Vec<_>>());
        let ds = Dataset::new(vec![Column::numeric("x", x), Column::numeric("noise", noise)]).unwrap();
        (ds, y)
    }

    fn linear(rows: &Dataset) -> Result<Array1<f64>> {
        Ok(rows.column("x")?.as_numeric().unwrap() * 3.0)
    }

    #[test]
    fn test_informative_variable_ranks_first() {
        let (ds, y) = data();
        let result = PermutationImportance::new(linear)
            .with_seed(42)
            .compute::<&str>(&ds, &y, None)
            .unwrap();

        let names: Vec<&str> = result.records.iter().map(|r| r.variable.as_str()).collect();
        assert_eq!(names, vec![FULL_MODEL, "x", "noise", BASELINE]);
        assert_relative_eq!(result.full_model_loss, 0.0);
        assert!(result.get("x").unwrap().importance > 0.0);
        assert_relative_eq!(result.get("noise").unwrap().importance, 0.0);
        assert_eq!(result.get("x").unwrap().permutation_losses.len(), 10);
    }

    #[test]
    fn test_baseline_is_constant_mean_predictor() {
        let (ds, y) = data();
        let result = PermutationImportance::new(linear)
            .with_n_permutations(1)
            .with_seed(1)
            .compute::<&str>(&ds, &y, None)
            .unwrap();
        let expected = loss_root_mean_square(&y, &Array1::from_elem(20, y.mean().unwrap())).unwrap();
        assert_relative_eq!(result.baseline_loss, expected);
        assert_relative_eq!(result.get(BASELINE).unwrap().importance, expected);
    }

    #[test]
    fn test_same_seed_same_result() {
        let (ds, y) = data();
        let run = || {
            PermutationImportance::new(linear)
                .with_seed(9)
                .with_n_permutations(3)
                .compute::<&str>(&ds, &y, None)
                .unwrap()
                .records
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_one_call_per_round_per_variable() {
        let (ds, y) = data();
        let calls = Cell::new(0);
        let model = |rows: &Dataset| -> Result<Array1<f64>> {
            calls.set(calls.get() + 1);
            linear(rows)
        };
        PermutationImportance::new(model)
            .with_n_permutations(4)
            .with_seed(0)
            .compute::<&str>(&ds, &y, None)
            .unwrap();
        // one unpermuted call, then 4 rounds over 2 variables
        assert_eq!(calls.get(), 1 + 4 * 2);
    }

    #[test]
    fn test_variable_groups_are_permuted_jointly() {
        let (ds, y) = data();
        let result = PermutationImportance::new(linear)
            .with_seed(3)
            .with_variable_groups(vec![("both", vec!["x", "noise"]), ("rest", vec!["noise"])])
            .compute::<&str>(&ds, &y, None)
            .unwrap();
        assert_eq!(result.variables(), vec!["both", "rest"]);
    }

    #[test]
    fn test_group_shares_one_permutation() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ds = Dataset::new(vec![
            Column::numeric("x", x.clone()),
            Column::numeric("x_copy", x),
        ])
        .unwrap();
        let y = Array1::zeros(20);
        // Zero whenever both columns are shuffled with the same row order
        let difference = |rows: &Dataset| -> Result<Array1<f64>> {
            let a = rows.column("x")?.as_numeric().unwrap();
            let b = rows.column("x_copy")?.as_numeric().unwrap();
            Ok(a - b)
        };
        let result = PermutationImportance::new(difference)
            .with_seed(11)
            .with_variable_groups(vec![("pair", vec!["x", "x_copy"]), ("alone", vec!["x"])])
            .compute::<&str>(&ds, &y, None)
            .unwrap();

        let pair = result.get("pair").unwrap();
        assert_eq!(pair.permutation_losses.len(), 10);
        assert!(pair.permutation_losses.iter().all(|&l| l == 0.0));
        assert_eq!(pair.importance, 0.0);
        assert!(result.get("alone").unwrap().importance > 0.0);
    }

    #[test]
    fn test_ratio_type() {
        let (ds, y) = data();
        let model = |rows: &Dataset| -> Result<Array1<f64>> { Ok(linear(rows)? + 1.0) };
        let result = PermutationImportance::new(model)
            .with_seed(5)
            .with_type(ImportanceType::Ratio)
            .compute::<&str>(&ds, &y, None)
            .unwrap();
        assert_relative_eq!(result.full_model_loss, 1.0);
        assert_relative_eq!(result.get("noise").unwrap().importance, 1.0);
        assert_relative_eq!(result.get(FULL_MODEL).unwrap().importance, 1.0);
    }

    #[test]
    fn test_sample_size_draws_per_round() {
        let (ds, y) = data();
        let calls = Cell::new(0);
        let model = |rows: &Dataset| -> Result<Array1<f64>> {
            calls.set(calls.get() + 1);
            assert_eq!(rows.n_rows(), 5);
            linear(rows)
        };
        let result = PermutationImportance::new(model)
            .with_seed(11)
            .with_n_permutations(2)
            .with_sample_size(5)
            .compute(&ds, &y, Some(&["x"][..]))
            .unwrap();
        assert_eq!(calls.get(), 2 * 2);
        assert_eq!(result.get(FULL_MODEL).unwrap().permutation_losses.len(), 2);
    }

    #[test]
    fn test_custom_loss() {
        let (ds, y) = data();
        let result = PermutationImportance::new(linear)
            .with_seed(2)
            .compute_with_loss::<&str, _>(&ds, &y, None, loss_mean_absolute_error)
            .unwrap();
        assert!(result.get("x").unwrap().mean_loss > 0.0);
    }

    #[test]
    fn test_loss_error_propagates() {
        let (ds, y) = data();
        let err = PermutationImportance::new(linear)
            .compute_with_loss::<&str, _>(&ds, &y, None, |_, _| {
                Err(ProfileError::Model("loss exploded".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, ProfileError::Model(msg) if msg == "loss exploded"));
    }

    #[test]
    fn test_validation_before_model_call() {
        let (ds, _) = data();
        let calls = Cell::new(0);
        let model = |rows: &Dataset| -> Result<Array1<f64>> {
            calls.set(calls.get() + 1);
            linear(rows)
        };
        let explainer = PermutationImportance::new(model);
        let short = Array1::zeros(3);
        assert!(matches!(
            explainer.compute::<&str>(&ds, &short, None),
            Err(ProfileError::ShapeError { .. })
        ));
        let y = Array1::zeros(20);
        assert!(matches!(
            explainer.compute(&ds, &y, Some(&["missing"][..])),
            Err(ProfileError::FeatureNotFound(_))
        ));
        assert_eq!(calls.get(), 0);
    }
}
