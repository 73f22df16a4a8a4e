//! Application Services
//!
//! - `pipeline`: Normalize, filter and publish one exchange's payloads
//! - `supervisor`: Start and stop adapter/pipeline task pairs
//! - `alerts`: Forward large events to an alert sink

pub mod alerts;
pub mod pipeline;
pub mod supervisor;

pub use alerts::AlertService;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use supervisor::{AdapterHandle, ConnectionSupervisor, StopOutcome, SupervisorSettings};
