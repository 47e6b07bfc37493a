pub mod correlation;
pub mod events;

pub use correlation::{CorrelationConfig, CorrelationEngine, CorrelationError, PendingStatistics};
pub use events::{EventBus, JanusEvent};
