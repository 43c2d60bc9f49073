use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::recorder::TestExecution;

/// A run's duration history is split in half and the halves' means compared;
/// deviations beyond this band classify the trend.
const DEGRADING_FACTOR: f64 = 1.1;
const IMPROVING_FACTOR: f64 = 0.9;
const MOST_FAILING_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "IMPROVING",
            Self::Degrading => "DEGRADING",
            Self::Stable => "STABLE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub test_name: String,
    pub average_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub trend_direction: TrendDirection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailingTest {
    pub name: String,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub failure_rate_by_category: BTreeMap<String, f64>,
    /// Ordered by failure count descending; ties keep first-seen order.
    pub most_failing_tests: Vec<FailingTest>,
    pub failure_timeline: BTreeMap<NaiveDate, u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityMetrics {
    pub flaky_tests: Vec<String>,
    pub consistency_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub date: NaiveDate,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub average_duration: f64,
}

/// Derived analytics over the full execution history. Recomputed on demand,
/// never authoritative state. Field names form the de facto schema the JSON
/// and HTML exporters honor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub pass_rate: f64,
    pub average_execution_time: f64,
    pub total_execution_time: u64,
    pub category_breakdown: BTreeMap<String, usize>,
    pub performance_trends: BTreeMap<String, PerformanceTrend>,
    pub failure_analysis: FailureAnalysis,
    pub stability_metrics: StabilityMetrics,
    pub execution_timeline: Vec<TimelineEntry>,
}

/// Pure function from the recorded history to a [`Report`]. Deterministic for
/// a given record sequence; the only timestamps consulted are the ones stored
/// on the records themselves.
pub fn generate_report(records: &[TestExecution]) -> Report {
    let total_tests = records.len();
    let passed_tests = records.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;
    let pass_rate = if total_tests > 0 {
        passed_tests as f64 * 100.0 / total_tests as f64
    } else {
        0.0
    };

    let total_execution_time: u64 = records.iter().map(|r| r.duration_ms).sum();
    let average_execution_time = if total_tests > 0 {
        total_execution_time as f64 / total_tests as f64
    } else {
        0.0
    };

    let mut category_breakdown = BTreeMap::new();
    for record in records {
        *category_breakdown.entry(record.category.clone()).or_insert(0) += 1;
    }

    let report = Report {
        total_tests,
        passed_tests,
        failed_tests,
        pass_rate,
        average_execution_time,
        total_execution_time,
        category_breakdown,
        performance_trends: performance_trends(records),
        failure_analysis: failure_analysis(records),
        stability_metrics: stability_metrics(records),
        execution_timeline: execution_timeline(records),
    };
    info!(total = total_tests, "generated analytics report");
    report
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<u64>() as f64 / values.len() as f64
}

/// Trends are only meaningful once a test has at least two measurements. The
/// history is split at floor(n/2); for odd n the middle record counts toward
/// the second half.
fn performance_trends(records: &[TestExecution]) -> BTreeMap<String, PerformanceTrend> {
    let mut durations_by_name: HashMap<&str, Vec<u64>> = HashMap::new();
    for record in records {
        durations_by_name
            .entry(record.name.as_str())
            .or_default()
            .push(record.duration_ms);
    }

    durations_by_name
        .into_iter()
        .filter(|(_, durations)| durations.len() >= 2)
        .map(|(name, durations)| {
            let (first_half, second_half) = durations.split_at(durations.len() / 2);
            let first_mean = mean(first_half);
            let second_mean = mean(second_half);
            let trend_direction = if second_mean > first_mean * DEGRADING_FACTOR {
                TrendDirection::Degrading
            } else if second_mean < first_mean * IMPROVING_FACTOR {
                TrendDirection::Improving
            } else {
                TrendDirection::Stable
            };

            let trend = PerformanceTrend {
                test_name: name.to_string(),
                average_duration: mean(&durations),
                min_duration: durations.iter().copied().min().unwrap_or(0) as f64,
                max_duration: durations.iter().copied().max().unwrap_or(0) as f64,
                trend_direction,
            };
            (name.to_string(), trend)
        })
        .collect()
}

fn failure_analysis(records: &[TestExecution]) -> FailureAnalysis {
    let mut total_by_category: HashMap<&str, u64> = HashMap::new();
    let mut failures_by_category: HashMap<&str, u64> = HashMap::new();
    for record in records {
        *total_by_category.entry(record.category.as_str()).or_default() += 1;
        if !record.passed {
            *failures_by_category
                .entry(record.category.as_str())
                .or_default() += 1;
        }
    }
    let failure_rate_by_category = total_by_category
        .iter()
        .map(|(&category, &total)| {
            let failures = failures_by_category.get(category).copied().unwrap_or(0);
            let rate = if total > 0 {
                failures as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            (category.to_string(), rate)
        })
        .collect();

    // Counting in record order keeps ties ranked by first encounter; the
    // sort below is stable.
    let mut first_seen: Vec<String> = Vec::new();
    let mut failure_counts: HashMap<&str, u64> = HashMap::new();
    for record in records.iter().filter(|r| !r.passed) {
        if !failure_counts.contains_key(record.name.as_str()) {
            first_seen.push(record.name.clone());
        }
        *failure_counts.entry(record.name.as_str()).or_default() += 1;
    }
    let mut most_failing_tests: Vec<FailingTest> = first_seen
        .into_iter()
        .map(|name| {
            let failures = failure_counts.get(name.as_str()).copied().unwrap_or(0);
            FailingTest { name, failures }
        })
        .collect();
    most_failing_tests.sort_by(|a, b| b.failures.cmp(&a.failures));
    most_failing_tests.truncate(MOST_FAILING_LIMIT);

    let mut failure_timeline = BTreeMap::new();
    for record in records.iter().filter(|r| !r.passed) {
        *failure_timeline
            .entry(record.timestamp.date_naive())
            .or_insert(0u64) += 1;
    }

    FailureAnalysis {
        failure_rate_by_category,
        most_failing_tests,
        failure_timeline,
    }
}

fn stability_metrics(records: &[TestExecution]) -> StabilityMetrics {
    let mut first_seen: Vec<&str> = Vec::new();
    let mut outcomes: HashMap<&str, (u64, u64)> = HashMap::new();
    for record in records {
        let entry = outcomes.entry(record.name.as_str()).or_insert_with(|| {
            first_seen.push(record.name.as_str());
            (0, 0)
        });
        if record.passed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut flaky_tests = Vec::new();
    let mut eligible = 0u64;
    let mut consistent = 0u64;
    for name in first_seen {
        let (passes, fails) = outcomes[name];
        if passes + fails < 2 {
            continue;
        }
        eligible += 1;
        if passes > 0 && fails > 0 {
            flaky_tests.push(name.to_string());
        } else {
            consistent += 1;
        }
    }

    // Vacuously consistent when no test ran more than once.
    let consistency_score = if eligible > 0 {
        consistent as f64 * 100.0 / eligible as f64
    } else {
        100.0
    };

    StabilityMetrics {
        flaky_tests,
        consistency_score,
    }
}

fn execution_timeline(records: &[TestExecution]) -> Vec<TimelineEntry> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&TestExecution>> = BTreeMap::new();
    for record in records {
        by_date
            .entry(record.timestamp.date_naive())
            .or_default()
            .push(record);
    }

    by_date
        .into_iter()
        .map(|(date, executions)| {
            let total_tests = executions.len();
            let passed_tests = executions.iter().filter(|e| e.passed).count();
            let durations: Vec<u64> = executions.iter().map(|e| e.duration_ms).collect();
            TimelineEntry {
                date,
                total_tests,
                passed_tests,
                failed_tests: total_tests - passed_tests,
                average_duration: mean(&durations),
            }
        })
        .collect()
}
