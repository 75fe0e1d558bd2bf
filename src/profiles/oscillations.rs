//! Ceteris paribus oscillations

use super::ceteris_paribus::ProfileTable;
use serde::{Deserialize, Serialize};

/// Local variable importance for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    pub id: usize,
    pub variable: String,
    /// Mean absolute deviation of the profile from the observation's own prediction
    pub oscillation: f64,
    pub label: String,
}

/// Oscillation of every (observation, variable) profile, largest first.
///
/// Ties keep row order.
pub fn oscillations(table: &ProfileTable) -> Vec<Oscillation> {
    let n_vars = table.splits().len();
    let n_obs = table.observations().n_rows();
    let own = table.observation_predictions();

    let mut sums = vec![0.0; n_obs * n_vars];
    let mut counts = vec![0usize; n_obs * n_vars];
    for row in 0..table.len() {
        let id = table.id(row);
        let slot = id * n_vars + table.variable_position(row);
        sums[slot] += (table.predictions()[row] - own[id]).abs();
        counts[slot] += 1;
    }

    let mut result: Vec<Oscillation> = (0..n_obs * n_vars)
        .filter(|&slot| counts[slot] > 0)
        .map(|slot| Oscillation {
            id: slot / n_vars,
            variable: table.splits().at(slot % n_vars).variable.clone(),
            oscillation: sums[slot] / counts[slot] as f64,
            label: table.label().to_string(),
        })
        .collect();

    result.sort_by(|a, b| b.oscillation.total_cmp(&a.oscillation));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Dataset};
    use crate::error::Result;
    use crate::profiles::{ProfileBuilder, VariableSplitter};
    use ndarray::Array1;

    #[test]
    fn test_oscillations_rank_influential_variable_first() {
        let ds = Dataset::new(vec![
            Column::numeric("strong", vec![0.0, 1.0, 2.0]),
            Column::numeric("weak", vec![0.0, 1.0, 2.0]),
        ])
        .unwrap();
        let model = |rows: &Dataset| -> Result<Array1<f64>> {
            let strong = rows.column("strong")?.as_numeric().unwrap();
            let weak = rows.column("weak")?.as_numeric().unwrap();
            Ok(strong * 10.0 + weak)
        };
        let splits = VariableSplitter::new().split::<&str>(&ds, None).unwrap();
        let table = ProfileBuilder::new(model).build(&ds.take(&[0]), &splits).unwrap();

        let osc = oscillations(&table);
        assert_eq!(osc.len(), 2);
        assert_eq!(osc[0].variable, "strong");
        // profile of `strong` from x = 0: |0|, |10|, |20| -> mean 10
        assert_eq!(osc[0].oscillation, 10.0);
        assert_eq!(osc[1].oscillation, 1.0);
    }
}
