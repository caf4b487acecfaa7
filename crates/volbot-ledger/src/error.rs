use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
