//! Loss functions for permutation importance
//!
//! Every loss takes `(observed, predicted)` and fails with a shape error
//! when the lengths differ.

use crate::error::{ProfileError, Result};
use ndarray::Array1;

const PROBABILITY_EPS: f64 = 1e-15;

fn check_lengths(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<()> {
    if observed.len() != predicted.len() {
        return Err(ProfileError::shape(
            format!("{} predictions", observed.len()),
            predicted.len(),
        ));
    }
    if observed.is_empty() {
        return Err(ProfileError::InvalidInput("cannot compute loss on zero rows".to_string()));
    }
    Ok(())
}

/// Square root of the mean squared error
pub fn loss_root_mean_square(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    check_lengths(observed, predicted)?;
    let mse = (observed - predicted).mapv(|d| d * d).mean().unwrap_or(0.0);
    Ok(mse.sqrt())
}

pub fn loss_sum_of_squares(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    check_lengths(observed, predicted)?;
    Ok((observed - predicted).mapv(|d| d * d).sum())
}

pub fn loss_mean_absolute_error(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    check_lengths(observed, predicted)?;
    Ok((observed - predicted).mapv(f64::abs).mean().unwrap_or(0.0))
}

/// Share of misclassified rows, with labels in {0, 1} and predictions
/// above 0.5 read as class 1
pub fn loss_one_minus_accuracy(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    check_lengths(observed, predicted)?;
    let correct = observed
        .iter()
        .zip(predicted.iter())
        .filter(|&(&y, &p)| (p > 0.5) == (y > 0.5))
        .count();
    Ok(1.0 - correct as f64 / observed.len() as f64)
}

/// Binary cross entropy of predicted probabilities; probabilities are
/// clipped away from 0 and 1
pub fn loss_cross_entropy(observed: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    check_lengths(observed, predicted)?;
    let total: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(&y, &p)| {
            let p = p.clamp(PROBABILITY_EPS, 1.0 - PROBABILITY_EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    Ok(total / observed.len() as f64)
}
