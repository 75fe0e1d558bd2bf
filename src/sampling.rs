//! Row selection helpers for choosing observations to explain

use crate::data::{ColumnData, Dataset};
use crate::error::{ProfileError, Result};
use rand::prelude::*;

/// Uniform sample of `n` rows without replacement, in original row order.
///
/// Returns every row when `n` is at least the number of rows.
pub fn select_sample(data: &Dataset, n: usize, seed: Option<u64>) -> Result<Dataset> {
    if data.is_empty() {
        return Err(ProfileError::InvalidInput("dataset is empty".to_string()));
    }
    if n == 0 {
        return Err(ProfileError::InvalidParameter {
            name: "n".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if n >= data.n_rows() {
        return Ok(data.clone());
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices = rand::seq::index::sample(&mut rng, data.n_rows(), n).into_vec();
    indices.sort_unstable();
    Ok(data.take(&indices))
}

/// The `n` rows of `data` closest to `observation` by Gower distance over
/// `variables` (every column when `None`), nearest first.
///
/// Numeric differences are scaled by the column's range in `data`;
/// categorical columns contribute 0 on a match and 1 otherwise. Missing
/// numeric values are skipped. Ties keep row order.
pub fn select_neighbours<S: AsRef<str>>(
    data: &Dataset,
    observation: &Dataset,
    n: usize,
    variables: Option<&[S]>,
) -> Result<Dataset> {
    if data.is_empty() {
        return Err(ProfileError::InvalidInput("dataset is empty".to_string()));
    }
    if observation.n_rows() != 1 {
        return Err(ProfileError::InvalidInput(format!(
            "expected a single observation, got {}",
            observation.n_rows()
        )));
    }
    let schema = data.schema();
    let indices = schema.resolve(variables)?;
    let observation = observation.select_schema(&schema)?;

    let mut distances = vec![0.0; data.n_rows()];
    let mut counts = vec![0usize; data.n_rows()];
    for idx in indices {
        let column = data.column_at(idx);
        let target = observation.column_at(idx);
        match (column.data(), target.data()) {
            (ColumnData::Numeric(values), ColumnData::Numeric(t)) => {
                let x = t[0];
                if !x.is_finite() {
                    continue;
                }
                let finite = values.iter().copied().filter(|v| v.is_finite());
                let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
                let range = max - min;
                for (row, &v) in values.iter().enumerate() {
                    if !v.is_finite() {
                        continue;
                    }
                    distances[row] += if range > 0.0 { (v - x).abs() / range } else { 0.0 };
                    counts[row] += 1;
                }
            }
            _ => {
                let wanted = target.value(0);
                for (row, (distance, count)) in
                    distances.iter_mut().zip(counts.iter_mut()).enumerate()
                {
                    if column.value(row) != wanted {
                        *distance += 1.0;
                    }
                    *count += 1;
                }
            }
        }
    }

    let mut order: Vec<(usize, f64)> = distances
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(row, (&d, &c))| (row, if c > 0 { d / c as f64 } else { f64::INFINITY }))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let nearest: Vec<usize> = order.into_iter().take(n).map(|(row, _)| row).collect();
    Ok(data.take(&nearest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Value};

    fn data() -> Dataset {
        Dataset::new(vec![
            Column::numeric("x", vec![0.0, 10.0, 2.0, 8.0, 5.0]),
            Column::categorical("g", &["a", "b", "a", "b", "a"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_select_sample_size_and_order() {
        let sample = select_sample(&data(), 3, Some(7)).unwrap();
        assert_eq!(sample.n_rows(), 3);
        let xs: Vec<f64> = sample.column("x").unwrap().as_numeric().unwrap().to_vec();
        let positions: Vec<usize> = xs
            .iter()
            .map(|x| [0.0, 10.0, 2.0, 8.0, 5.0].iter().position(|v| v == x).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_select_sample_is_reproducible() {
        let a = select_sample(&data(), 2, Some(42)).unwrap();
        let b = select_sample(&data(), 2, Some(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_select_sample_all_rows() {
        assert_eq!(select_sample(&data(), 10, None).unwrap().n_rows(), 5);
    }

    #[test]
    fn test_select_sample_zero() {
        assert!(select_sample(&data(), 0, None).is_err());
    }

    #[test]
    fn test_select_neighbours() {
        let obs = Dataset::new(vec![
            Column::numeric("x", vec![8.5]),
            Column::categorical("g", &["b"]),
        ])
        .unwrap();
        let near = select_neighbours::<&str>(&data(), &obs, 2, None).unwrap();
        assert_eq!(near.n_rows(), 2);
        assert_eq!(near.value(0, 0), Value::Numeric(8.0));
        assert_eq!(near.value(1, 0), Value::Numeric(10.0));
    }

    #[test]
    fn test_select_neighbours_subset_of_variables() {
        let obs = Dataset::new(vec![
            Column::numeric("x", vec![4.0]),
            Column::categorical("g", &["b"]),
        ])
        .unwrap();
        let near = select_neighbours(&data(), &obs, 1, Some(&["x"][..])).unwrap();
        assert_eq!(near.value(0, 0), Value::Numeric(5.0));
    }
}
