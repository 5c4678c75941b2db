use common::error::MarketDataError;

/// Conversion of a decoded exchange payload into domain values.
pub trait RemoteResponse<T> {
    fn to_domain(&self) -> Result<T, MarketDataError>;
}
