use std::future::Future;

use anyhow::Result;
use tracing::{error, warn};

use crate::response::ResponseFacts;
use crate::strategy::{self, TestContext, TestResult, TestType};

const DEFAULT_MAX_RETRIES: u32 = 2;

/// Bounded retry for failed strategy executions. This is the only retry in
/// the harness; the engine underneath never retries on its own.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: TestResult,
    /// Total executions performed, the initial attempt included.
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Executes the strategy, re-running it while the result is failing and
    /// retries remain. Returns the final result and the attempt count.
    pub async fn run<F, Fut>(
        &self,
        kind: TestType,
        context: &TestContext,
        call: F,
    ) -> RetryOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ResponseFacts>>,
    {
        let mut attempts = 1;
        let mut result = strategy::execute(kind, context, &call).await;

        for retry in 1..=self.max_retries {
            if result.success {
                break;
            }
            let reason = result
                .failed_validations()
                .first()
                .map(|v| v.message.clone())
                .unwrap_or_else(|| "unknown failure".to_string());
            warn!(%kind, retry, max = self.max_retries, %reason, "retrying failed execution");

            attempts += 1;
            result = strategy::execute(kind, context, &call).await;
        }

        if !result.success {
            error!(%kind, attempts, "execution still failing after all attempts");
        }
        RetryOutcome { result, attempts }
    }
}
