//! 内置任务族

pub mod http;
pub mod shell;

pub use http::{HttpJob, HttpJobFactory};
pub use shell::{ShellJob, ShellJobFactory};
