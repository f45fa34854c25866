pub mod job;
pub mod message_queue;
pub mod strategy;
pub mod toggle_store;

pub use job::*;
pub use message_queue::*;
pub use strategy::*;
pub use toggle_store::*;
