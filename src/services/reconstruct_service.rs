use ndarray::{Array1, Array2};

use crate::errors::AppError;
use crate::models::Feature;
use crate::services::scaler::ScalerState;

/// Turns normalized close predictions back into prices.
///
/// The predictions are written into the close column of an otherwise zero
/// matrix shaped like the scaler's fit input, the whole matrix is inverted, and
/// only the close column is kept. The other four inverted columns come out as
/// each channel's minimum and are discarded.
pub fn reconstruct_close_prices(
    predictions: &Array1<f64>,
    scaler: &ScalerState,
) -> Result<Vec<f64>, AppError> {
    let mut padded = Array2::zeros((predictions.len(), scaler.channels()));
    padded.column_mut(Feature::Close.index()).assign(predictions);

    let restored = scaler.inverse(&padded)?;
    Ok(restored.column(Feature::Close.index()).to_vec())
}
