use std::fmt;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Feature channels in the column order the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Close,
    Volume,
    Open,
    High,
    Low,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Close,
        Feature::Volume,
        Feature::Open,
        Feature::High,
        Feature::Low,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Feature> {
        Self::ALL.get(index).copied()
    }

    /// Column header used by the NASDAQ historical export.
    pub fn column_name(self) -> &'static str {
        match self {
            Feature::Close => "Close/Last",
            Feature::Volume => "Volume",
            Feature::Open => "Open",
            Feature::High => "High",
            Feature::Low => "Low",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One trading day as uploaded by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
}

impl RawRow {
    pub fn feature_vector(&self) -> FeatureVector {
        [
            self.close,
            self.volume as f64,
            self.open,
            self.high,
            self.low,
        ]
    }
}

/// `(close, volume, open, high, low)`, indexed by [`Feature::index`].
pub type FeatureVector = [f64; Feature::COUNT];

/// Stacks rows into an `(n, 5)` matrix in canonical channel order.
pub fn feature_matrix(rows: &[RawRow]) -> Array2<f64> {
    let mut matrix = Array2::zeros((rows.len(), Feature::COUNT));
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.feature_vector().into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    matrix
}
