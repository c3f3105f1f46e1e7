pub mod config;
pub mod error;
pub mod recipients;
pub mod types;

pub use config::AppConfig;
pub use error::{DeliveryError, RelayError, RelayResult, ValidationError};
pub use recipients::{normalize, parse_all, Recipient};
