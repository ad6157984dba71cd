//! Per-request min-max normalization.
//!
//! A [`ScalerState`] is fit once from the full feature matrix of a request and
//! then used for both the forward transform of the model input and the inverse
//! transform of the model output. Nothing is cached between requests.

use std::str::FromStr;

use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Feature;

/// What to do when a channel has the same value in every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantChannelPolicy {
    /// Fail with [`AppError::DegenerateRange`].
    Reject,
    /// Treat the range as 1 so the channel maps to 0 and inverts exactly.
    UnitRange,
}

impl FromStr for ConstantChannelPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(ConstantChannelPolicy::Reject),
            "unit_range" | "unit-range" => Ok(ConstantChannelPolicy::UnitRange),
            other => Err(AppError::Validation(format!(
                "Invalid constant channel policy: {}. Must be 'reject' or 'unit_range'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalerState {
    min: Array1<f64>,
    max: Array1<f64>,
    /// `max - min`, or 1.0 for constant channels under `UnitRange`.
    scale: Array1<f64>,
}

impl ScalerState {
    /// Fit per-channel `(min, max)` over every row of `matrix`.
    pub fn fit(matrix: &Array2<f64>, policy: ConstantChannelPolicy) -> Result<Self, AppError> {
        let (rows, channels) = matrix.dim();
        if rows == 0 {
            return Err(AppError::Schema("cannot fit scaler on an empty matrix".to_string()));
        }
        if channels != Feature::COUNT {
            return Err(AppError::Schema(format!(
                "expected {} feature channels, got {}",
                Feature::COUNT,
                channels
            )));
        }

        let mut min = Array1::zeros(channels);
        let mut max = Array1::zeros(channels);
        let mut scale = Array1::zeros(channels);

        for (c, column) in matrix.axis_iter(Axis(1)).enumerate() {
            if column.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Schema(format!(
                    "channel {} contains non-finite values",
                    channel_name(c)
                )));
            }
            let (lo, hi) = column_extremes(column);

            let range = hi - lo;
            if !range.is_finite() {
                return Err(AppError::Schema(format!(
                    "channel {} spans [{}, {}], too wide to normalize",
                    channel_name(c),
                    lo,
                    hi
                )));
            }
            scale[c] = if range == 0.0 {
                match policy {
                    ConstantChannelPolicy::Reject => {
                        return Err(AppError::DegenerateRange {
                            channel: Feature::ALL[c],
                            value: lo,
                        })
                    }
                    ConstantChannelPolicy::UnitRange => 1.0,
                }
            } else {
                range
            };
            min[c] = lo;
            max[c] = hi;
        }

        Ok(Self { min, max, scale })
    }

    pub fn min(&self) -> &Array1<f64> {
        &self.min
    }

    pub fn max(&self) -> &Array1<f64> {
        &self.max
    }

    pub fn channels(&self) -> usize {
        self.min.len()
    }

    pub fn transform_value(&self, channel: Feature, value: f64) -> f64 {
        let c = channel.index();
        (value - self.min[c]) / self.scale[c]
    }

    pub fn inverse_value(&self, channel: Feature, normalized: f64) -> f64 {
        let c = channel.index();
        normalized * self.scale[c] + self.min[c]
    }

    /// `(v - min) / (max - min)` per channel. Values outside the fit range
    /// land outside `[0, 1]`.
    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, AppError> {
        self.check_channels(matrix.ncols())?;
        Ok((matrix - &self.min) / &self.scale)
    }

    pub fn inverse(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, AppError> {
        self.check_channels(matrix.ncols())?;
        Ok(matrix * &self.scale + &self.min)
    }

    /// Transform a `(batch, steps, channels)` tensor of windows.
    pub fn transform_batch(&self, batch: &Array3<f64>) -> Result<Array3<f64>, AppError> {
        self.check_channels(batch.shape()[2])?;
        Ok((batch - &self.min) / &self.scale)
    }

    fn check_channels(&self, got: usize) -> Result<(), AppError> {
        if got != self.channels() {
            return Err(AppError::Schema(format!(
                "scaler was fit on {} channels, got {}",
                self.channels(),
                got
            )));
        }
        Ok(())
    }
}

fn column_extremes(column: ArrayView1<f64>) -> (f64, f64) {
    column
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn channel_name(index: usize) -> String {
    Feature::from_index(index)
        .map(|f| f.to_string())
        .unwrap_or_else(|| index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![
            [10.0, 100.0, 9.0, 11.0, 8.0],
            [12.0, 300.0, 11.0, 13.0, 10.0],
            [14.0, 200.0, 13.0, 16.0, 12.0],
        ]
    }

    #[test]
    fn test_fit_records_extremes() {
        let state = ScalerState::fit(&sample(), ConstantChannelPolicy::Reject).unwrap();
        assert_eq!(state.min().to_vec(), vec![10.0, 100.0, 9.0, 11.0, 8.0]);
        assert_eq!(state.max().to_vec(), vec![14.0, 300.0, 13.0, 16.0, 12.0]);
    }

    #[test]
    fn test_transform_maps_fit_range_to_unit_interval() {
        let state = ScalerState::fit(&sample(), ConstantChannelPolicy::Reject).unwrap();
        let scaled = state.transform(&sample()).unwrap();
        assert_eq!(scaled.row(0).to_vec(), vec![0.0; 5]);
        assert_eq!(scaled.row(2).to_vec(), vec![1.0, 0.5, 1.0, 1.0, 1.0]);
        assert_eq!(scaled[[1, 0]], 0.5);
    }

    #[test]
    fn test_values_outside_fit_range_are_not_clamped() {
        let state = ScalerState::fit(&sample(), ConstantChannelPolicy::Reject).unwrap();
        assert_eq!(state.transform_value(Feature::Close, 18.0), 2.0);
        assert_eq!(state.transform_value(Feature::Close, 6.0), -1.0);
    }

    #[test]
    fn test_round_trip_reproduces_input() {
        let data = sample();
        let state = ScalerState::fit(&data, ConstantChannelPolicy::Reject).unwrap();
        let restored = state.inverse(&state.transform(&data).unwrap()).unwrap();
        for (a, b) in data.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_channel_is_rejected() {
        let mut data = sample();
        data.column_mut(1).fill(1000.0);
        let err = ScalerState::fit(&data, ConstantChannelPolicy::Reject).unwrap_err();
        match err {
            AppError::DegenerateRange { channel, value } => {
                assert_eq!(channel, Feature::Volume);
                assert_eq!(value, 1000.0);
            }
            other => panic!("expected DegenerateRange, got {:?}", other),
        }
    }

    #[test]
    fn test_unit_range_policy_handles_constant_channel() {
        let mut data = sample();
        data.column_mut(1).fill(1000.0);
        let state = ScalerState::fit(&data, ConstantChannelPolicy::UnitRange).unwrap();
        let scaled = state.transform(&data).unwrap();
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
        let restored = state.inverse(&scaled).unwrap();
        assert_eq!(restored.column(1).to_vec(), vec![1000.0; 3]);
    }

    #[test]
    fn test_fit_rejects_empty_and_wrong_width() {
        let empty = Array2::<f64>::zeros((0, 5));
        assert!(matches!(
            ScalerState::fit(&empty, ConstantChannelPolicy::Reject),
            Err(AppError::Schema(_))
        ));
        let narrow = Array2::<f64>::zeros((3, 4));
        assert!(matches!(
            ScalerState::fit(&narrow, ConstantChannelPolicy::Reject),
            Err(AppError::Schema(_))
        ));
    }

    #[test]
    fn test_fit_rejects_nan() {
        let mut data = sample();
        data[[1, 3]] = f64::NAN;
        assert!(matches!(
            ScalerState::fit(&data, ConstantChannelPolicy::Reject),
            Err(AppError::Schema(_))
        ));
    }

    #[test]
    fn test_fit_rejects_overflowing_range() {
        let mut data = sample();
        data[[0, 0]] = -1e308;
        data[[2, 0]] = 1e308;
        assert!(matches!(
            ScalerState::fit(&data, ConstantChannelPolicy::Reject),
            Err(AppError::Schema(msg)) if msg.contains("Close/Last")
        ));
    }

    #[test]
    fn test_transform_batch_matches_matrix_transform() {
        let data = sample();
        let state = ScalerState::fit(&data, ConstantChannelPolicy::Reject).unwrap();
        let batch = data.clone().insert_axis(Axis(0));
        let scaled_batch = state.transform_batch(&batch).unwrap();
        let scaled = state.transform(&data).unwrap();
        assert_eq!(scaled_batch.index_axis(Axis(0), 0), scaled);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("reject".parse::<ConstantChannelPolicy>().unwrap(), ConstantChannelPolicy::Reject);
        assert_eq!(
            "UNIT_RANGE".parse::<ConstantChannelPolicy>().unwrap(),
            ConstantChannelPolicy::UnitRange
        );
        assert!("clip".parse::<ConstantChannelPolicy>().is_err());
    }
}
