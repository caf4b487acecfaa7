pub mod error;
pub mod memory;
pub mod oracle;

pub use error::OracleError;
pub use memory::MemoryCache;
pub use oracle::{fallback_price, PriceOracle, NOMINAL_PRICE};
