use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{PredictionRequest, PredictionResponse};
use crate::services::calendar::business_days_after;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(predict))
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("POST /LSTM_Prediction - Rejected body: {}", rejection.body_text());
        AppError::from(rejection)
    })?;

    info!(
        "POST /LSTM_Prediction - Forecasting {} ({} bytes of price data)",
        request.stock_name,
        request.stock_data.len()
    );

    let result = state
        .pipeline
        .forecast(&request.stock_name, &request.stock_data)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                warn!("Rejected forecast request for {}: {}", request.stock_name, e);
            } else {
                error!("Forecast failed for {}: {}", request.stock_name, e);
            }
            e
        })?;

    let dates = business_days_after(result.last_observed, result.close_prices.len());
    Ok(Json(PredictionResponse {
        prediction: result.close_prices,
        dates,
    }))
}
