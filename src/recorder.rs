use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::strategy::{TestResult, TestType};

/// One recorded outcome of running a named test. Immutable once recorded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    pub name: String,
    pub category: String,
    pub passed: bool,
    #[serde(rename = "durationMillis")]
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl TestExecution {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        passed: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            passed,
            duration_ms,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Default)]
struct RecorderState {
    records: Vec<TestExecution>,
    durations_by_name: HashMap<String, Vec<u64>>,
    count_by_category: HashMap<String, usize>,
}

/// Append-only store of test executions shared across workers.
///
/// One coarse lock serializes every append together with its index updates,
/// so readers never observe a record without its index contributions.
/// Contention is low and updates are O(1); nothing finer-grained is needed.
#[derive(Default)]
pub struct ExecutionRecorder {
    state: Mutex<RecorderState>,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record. Never rejects; business validation happens upstream.
    pub fn record(&self, execution: TestExecution) {
        debug!(
            name = %execution.name,
            category = %execution.category,
            passed = execution.passed,
            "recorded test execution"
        );
        let mut state = self.state();
        state
            .durations_by_name
            .entry(execution.name.clone())
            .or_default()
            .push(execution.duration_ms);
        *state
            .count_by_category
            .entry(execution.category.clone())
            .or_default() += 1;
        state.records.push(execution);
    }

    /// Bridges a strategy result into the record stream.
    pub fn record_result(&self, name: impl Into<String>, kind: TestType, result: &TestResult) {
        let mut execution = TestExecution::new(
            name,
            kind.as_str(),
            result.success,
            result.response_time_ms,
        );
        if let Some(status) = result.status_code {
            execution = execution.with_metadata("statusCode", status);
        }
        self.record(execution);
    }

    /// Snapshot of the full history. Records appended after the call are not
    /// visible through the returned vector.
    pub fn all_records(&self) -> Vec<TestExecution> {
        self.state().records.clone()
    }

    pub fn durations_for(&self, name: &str) -> Vec<u64> {
        self.state()
            .durations_by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn category_counts(&self) -> HashMap<String, usize> {
        self.state().count_by_category.clone()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
