pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use errors::*;
pub use models::{ContractKey, JobDescriptor, JobDescriptorBuilder, JobMessage, JobStep, Message};
pub use traits::{ExecutionStrategy, JobLog, LegacyJob, LegacyJobFactory, MessageQueue, ToggleStore};

pub use tokio_util::sync::CancellationToken;
