use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::executor::types::{TaskResult, TaskSpec};

use super::types::CancelSignal;

/// Runs one task to completion. Implementations never fail: every problem
/// is reported through the returned [`TaskResult`]'s status.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        spec: &TaskSpec,
        ctx: &Context,
        timeout: Duration,
        cancel: CancelSignal,
    ) -> TaskResult;
}
