//! Model prediction capability
//!
//! Explanations never inspect a model; they only call [`Predict::predict`]
//! on batches of rows that share the reference dataset's schema.

use crate::data::Dataset;
use crate::error::{ProfileError, Result};
use ndarray::{Array1, Array2};
use tracing::debug;

/// A fitted model seen as a function from a batch of rows to one
/// prediction per row, in row order.
///
/// Implementations must be deterministic and free of side effects.
/// Any closure `Fn(&Dataset) -> Result<Array1<f64>>` is a model.
pub trait Predict {
    fn predict(&self, rows: &Dataset) -> Result<Array1<f64>>;
}

impl<F> Predict for F
where
    F: Fn(&Dataset) -> Result<Array1<f64>>,
{
    fn predict(&self, rows: &Dataset) -> Result<Array1<f64>> {
        self(rows)
    }
}

/// Adapter for models that score a dense feature matrix.
///
/// Columns are passed in dataset order; categorical columns arrive as
/// level codes.
pub struct NumericModel<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    predict_fn: F,
}

impl<F> NumericModel<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    pub fn new(predict_fn: F) -> Self {
        Self { predict_fn }
    }
}

impl<F> Predict for NumericModel<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    fn predict(&self, rows: &Dataset) -> Result<Array1<f64>> {
        (self.predict_fn)(&rows.to_array2())
    }
}

/// Score a batch and check that the model returned one value per row.
pub(crate) fn predict_batch<M: Predict + ?Sized>(model: &M, rows: &Dataset) -> Result<Array1<f64>> {
    debug!(batch_size = rows.n_rows(), "Scoring batch");
    let predictions = model.predict(rows)?;
    if predictions.len() != rows.n_rows() {
        return Err(ProfileError::shape(
            format!("{} predictions", rows.n_rows()),
            predictions.len(),
        ));
    }
    Ok(predictions)
}
