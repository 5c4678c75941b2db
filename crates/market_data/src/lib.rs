pub mod remote;
pub mod traits;

pub use remote::BybitClient;
