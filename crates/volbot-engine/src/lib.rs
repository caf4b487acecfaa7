pub mod agent;
pub mod error;
pub mod fleet;
pub mod pipeline;
pub mod scheduler;

pub use agent::{Agent, LifecycleState, TradeOrigin, TradePermit};
pub use error::TradeError;
pub use fleet::{AgentBalance, Fleet};
pub use pipeline::TradePipeline;
pub use scheduler::Scheduler;
