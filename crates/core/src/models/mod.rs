//! # 数据模型
//!
//! - [`JobDescriptor`]：一次任务执行的不可变描述
//! - [`JobMessage`]：描述符在消息队列上的线上格式
//! - [`Message`]：传输层消息

pub mod descriptor;
pub mod message;

pub use descriptor::*;
pub use message::*;
