pub mod bybit_client;
pub mod kline_response;

pub use bybit_client::BybitClient;
pub use kline_response::KlineResponse;
