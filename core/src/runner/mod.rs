//! Command Executor: binds a [`TaskSpec`](crate::executor::types::TaskSpec)
//! against the run context, launches it and turns every outcome, including
//! start failures and timeouts, into a [`TaskResult`](crate::executor::types::TaskResult).

pub mod command;
mod io_pump;
mod process;
mod traits;
pub mod types;

pub use command::{bind, BindError, BoundCommand};
pub use process::{execute, ProcessRunner};
pub use traits::CommandRunner;
pub use types::{CancelHandle, CancelSignal};
