//! HTTP service that forecasts the next close price of a stock from an
//! uploaded window of daily price history and a pretrained LSTM.

pub mod app;
pub mod config;
pub mod errors;
pub mod external;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
