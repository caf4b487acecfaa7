pub mod error;
pub mod gateway;
pub mod paper;
pub mod retry;

pub use error::{RetryError, VenueError};
pub use gateway::{AssetAccount, Execution, Route, VenueGateway};
pub use paper::PaperVenue;
pub use retry::execute_with_retry;
