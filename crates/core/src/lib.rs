//! Core types shared across the quiz funnel workspace — configuration,
//! errors, the step data model, display conditions, the step catalog, the
//! session context and the funnel event bus.

pub mod catalog;
pub mod condition;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod session;
pub mod stats;
pub mod types;

pub use catalog::StepCatalog;
pub use condition::Condition;
pub use config::AppConfig;
pub use error::{FunnelError, FunnelResult};
pub use event_bus::EventSink;
pub use session::{SessionContext, UtmParams};
pub use stats::{DateFilter, RawFunnelStats};
pub use types::{AnswerMap, AnswerValue, FunnelEvent, StepDefinition, StepOption, StepType};
