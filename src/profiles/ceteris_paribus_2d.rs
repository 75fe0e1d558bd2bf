//! Two-variable ceteris paribus surfaces

use super::ceteris_paribus::{CeterisParibus, ProfileBuilder};
use super::split::VariableSplit;
use crate::data::{ColumnBuilder, Dataset, Value};
use crate::error::{ProfileError, Result};
use crate::model::{predict_batch, Predict};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One scored point of a pairwise surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow2D {
    pub variable_1: String,
    pub variable_2: String,
    pub value_1: Value,
    pub value_2: Value,
    /// Full feature vector, in observation column order
    pub features: Vec<Value>,
    pub yhat: f64,
    pub label: String,
}

/// Pairwise ceteris paribus surfaces for a single observation.
///
/// Rows are ordered pairs outer, first variable's grid middle, second
/// variable's grid inner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileTable2D {
    label: String,
    splits: VariableSplit,
    observation: Dataset,
    observation_yhat: f64,
    pairs: Vec<(usize, usize)>,
    features: Dataset,
    pair_index: Vec<usize>,
    positions: Vec<(usize, usize)>,
    yhat: Array1<f64>,
}

impl ProfileTable2D {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn splits(&self) -> &VariableSplit {
        &self.splits
    }

    pub fn observation(&self) -> &Dataset {
        &self.observation
    }

    pub fn observation_prediction(&self) -> f64 {
        self.observation_yhat
    }

    /// Variable pairs in row order
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.pairs
            .iter()
            .map(|&(a, b)| {
                (
                    self.splits.at(a).variable.as_str(),
                    self.splits.at(b).variable.as_str(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pair_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pair_index.is_empty()
    }

    pub fn predictions(&self) -> &Array1<f64> {
        &self.yhat
    }

    pub fn row(&self, row: usize) -> ProfileRow2D {
        let (a, b) = self.pairs[self.pair_index[row]];
        let (pos_a, pos_b) = self.positions[row];
        let (grid_a, grid_b) = (self.splits.at(a), self.splits.at(b));
        ProfileRow2D {
            variable_1: grid_a.variable.clone(),
            variable_2: grid_b.variable.clone(),
            value_1: grid_a.grid.value(pos_a),
            value_2: grid_b.grid.value(pos_b),
            features: self.features.row(row),
            yhat: self.yhat[row],
            label: self.label.clone(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = ProfileRow2D> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.rows().collect::<Vec<_>>())?)
    }
}

impl<M> ProfileBuilder<M>
where
    M: Predict,
{
    /// Score the full grid cross product of every unordered pair of split
    /// variables for a single observation.
    ///
    /// Cost is quadratic in the grid size: two 101-point grids give 10 201
    /// rows per pair, and the number of pairs grows quadratically with the
    /// number of variables. Keep grids modest. All pairs are scored in one
    /// model call.
    pub fn build_2d(&self, observation: &Dataset, splits: &VariableSplit) -> Result<ProfileTable2D> {
        if observation.n_rows() != 1 {
            return Err(ProfileError::InvalidInput(format!(
                "2D profiles explain exactly one observation, got {}",
                observation.n_rows()
            )));
        }
        if splits.len() < 2 {
            return Err(ProfileError::InvalidInput(
                "2D profiles need at least two variables".to_string(),
            ));
        }

        let mut columns_of = Vec::with_capacity(splits.len());
        for vg in splits.iter() {
            let col_idx = observation.column_index(&vg.variable)?;
            if observation.column_at(col_idx).kind() != vg.grid.kind() {
                return Err(ProfileError::InvalidInput(format!(
                    "variable '{}' does not match its grid kind {}",
                    vg.variable,
                    vg.grid.kind()
                )));
            }
            if columns_of.contains(&col_idx) {
                return Err(ProfileError::InvalidInput(format!(
                    "variable '{}' appears more than once in the splits",
                    vg.variable
                )));
            }
            columns_of.push(col_idx);
        }

        let mut pairs = Vec::new();
        for a in 0..splits.len() {
            for b in (a + 1)..splits.len() {
                pairs.push((a, b));
            }
        }

        let mut pair_index = Vec::new();
        let mut positions = Vec::new();
        for (p, &(a, b)) in pairs.iter().enumerate() {
            for pos_a in 0..splits.at(a).grid.len() {
                for pos_b in 0..splits.at(b).grid.len() {
                    pair_index.push(p);
                    positions.push((pos_a, pos_b));
                }
            }
        }
        let n_rows = pair_index.len();

        let mut columns = Vec::with_capacity(observation.n_cols());
        for (col_idx, column) in observation.columns().iter().enumerate() {
            let mut builder = ColumnBuilder::like(column, n_rows + 1);
            for row in 0..n_rows {
                let (a, b) = pairs[pair_index[row]];
                let (pos_a, pos_b) = positions[row];
                if columns_of[a] == col_idx {
                    builder.push(&splits.at(a).grid.value(pos_a))?;
                } else if columns_of[b] == col_idx {
                    builder.push(&splits.at(b).grid.value(pos_b))?;
                } else {
                    builder.push_from(column, 0)?;
                }
            }
            builder.push_from(column, 0)?;
            columns.push(builder.finish(column.name()));
        }
        let batch = Dataset::new(columns)?;

        debug!(label = %self.label(), pairs = pairs.len(), rows = n_rows, "Scoring 2D profiles");
        let predictions = predict_batch(self.model(), &batch)?;

        let surface_rows: Vec<usize> = (0..n_rows).collect();
        Ok(ProfileTable2D {
            label: self.label().to_string(),
            splits: splits.clone(),
            observation: observation.clone(),
            observation_yhat: predictions[n_rows],
            pairs,
            features: batch.take(&surface_rows),
            pair_index,
            positions,
            yhat: predictions.slice(ndarray::s![..n_rows]).to_owned(),
        })
    }
}

impl<M> CeterisParibus<M>
where
    M: Predict,
{
    /// Pairwise surfaces for one observation over `variables` (every
    /// reference column when `None`). See [`ProfileBuilder::build_2d`] for
    /// the cost caveat.
    pub fn explain_2d<S: AsRef<str>>(
        &self,
        observation: &Dataset,
        variables: Option<&[S]>,
    ) -> Result<ProfileTable2D> {
        let observation = observation.conform_to(self.data())?;
        let splits = self.splitter().split_for(self.data(), variables, &observation)?;
        self.builder().build_2d(&observation, &splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::profiles::split::VariableSplitter;

    fn data() -> Dataset {
        Dataset::new(vec![
            Column::numeric("x", vec![1.0, 2.0, 3.0]),
            Column::categorical("g", &["a", "b", "c"]),
            Column::numeric("z", vec![7.0, 8.0, 9.0]),
        ])
        .unwrap()
    }

    fn sum_model(rows: &Dataset) -> Result<Array1<f64>> {
        let x = rows.column("x")?.as_numeric().unwrap();
        let z = rows.column("z")?.as_numeric().unwrap();
        Ok(x + z)
    }

    #[test]
    fn test_cross_product_of_two_three_point_grids() {
        let ds = data();
        let splits = VariableSplitter::new().split(&ds, Some(&["x", "z"][..])).unwrap();
        let table = ProfileBuilder::new(sum_model)
            .build_2d(&ds.take(&[1]), &splits)
            .unwrap();

        assert_eq!(table.len(), 9);
        assert_eq!(table.pairs(), vec![("x", "z")]);
        let combos: Vec<(f64, f64)> = table
            .rows()
            .map(|r| (r.value_1.as_f64().unwrap(), r.value_2.as_f64().unwrap()))
            .collect();
        let expected: Vec<(f64, f64)> = [1.0, 2.0, 3.0]
            .iter()
            .flat_map(|&x| [7.0, 8.0, 9.0].into_iter().map(move |z| (x, z)))
            .collect();
        assert_eq!(combos, expected);
        for row in table.rows() {
            assert_eq!(row.features[1], Value::from("b"));
            assert_eq!(row.yhat, row.value_1.as_f64().unwrap() + row.value_2.as_f64().unwrap());
        }
        assert_eq!(table.observation_prediction(), 10.0);
    }

    #[test]
    fn test_all_pairs_by_default() {
        let explainer = CeterisParibus::new(sum_model, data());
        let table = explainer.explain_2d::<&str>(&data().take(&[0]), None).unwrap();
        assert_eq!(table.pairs(), vec![("x", "g"), ("x", "z"), ("g", "z")]);
        assert_eq!(table.len(), 27);
    }

    #[test]
    fn test_requires_single_observation() {
        let ds = data();
        let splits = VariableSplitter::new().split::<&str>(&ds, None).unwrap();
        let err = ProfileBuilder::new(sum_model).build_2d(&ds, &splits).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_split_variable_rejected() {
        let x = crate::profiles::VariableGrid {
            variable: "x".into(),
            grid: crate::profiles::Grid::Numeric(vec![1.0, 3.0]),
        };
        let splits = VariableSplit::new(vec![x.clone(), x]);
        let err = ProfileBuilder::new(sum_model)
            .build_2d(&data().take(&[0]), &splits)
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidInput(msg) if msg.contains("more than once")));
    }

    #[test]
    fn test_observation_levels_follow_reference_encoding() {
        let model = crate::model::NumericModel::new(|m: &ndarray::Array2<f64>| -> Result<Array1<f64>> {
            Ok(m.column(1).to_owned())
        });
        let explainer = CeterisParibus::new(model, data());
        let observation = Dataset::new(vec![
            Column::numeric("x", vec![2.0]),
            Column::categorical("g", &["c"]),
            Column::numeric("z", vec![8.0]),
        ])
        .unwrap();
        let table = explainer.explain_2d(&observation, Some(&["x", "z"][..])).unwrap();
        assert_eq!(table.observation_prediction(), 2.0);
        assert!(table.predictions().iter().all(|&y| y == 2.0));
    }

    #[test]
    fn test_requires_two_variables() {
        let ds = data();
        let splits = VariableSplitter::new().split(&ds, Some(&["x"][..])).unwrap();
        assert!(ProfileBuilder::new(sum_model).build_2d(&ds.take(&[0]), &splits).is_err());
    }
}
