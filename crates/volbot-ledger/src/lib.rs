pub mod error;
pub mod ledger;
pub mod store;

pub use error::LedgerError;
pub use ledger::TradeLedger;
pub use store::JsonStore;
