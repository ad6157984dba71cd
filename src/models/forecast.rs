use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Body of `POST /LSTM_Prediction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub stock_name: String,
    pub stock_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Vec<f64>,
    pub dates: Vec<NaiveDate>,
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Forecast close prices in chronological order, one per window.
    pub close_prices: Vec<f64>,
    /// Date of the most recent row the client supplied.
    pub last_observed: NaiveDate,
    pub rows_ingested: usize,
}
