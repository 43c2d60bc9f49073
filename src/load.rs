use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::response::ResponseFacts;

/// How long each logical user keeps issuing requests.
#[derive(Debug, Clone, Copy)]
pub enum LoadMode {
    /// Each user issues a fixed number of sequential requests.
    Iterations,
    /// Endurance: each user keeps issuing requests until the budget expires.
    Duration(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub users: usize,
    pub requests_per_user: usize,
    pub mode: LoadMode,
}

impl LoadOptions {
    pub fn new(users: usize, requests_per_user: usize) -> Self {
        Self {
            users,
            requests_per_user,
            mode: LoadMode::Iterations,
        }
    }

    pub fn endurance(users: usize, budget: Duration) -> Self {
        Self {
            users,
            requests_per_user: 0,
            mode: LoadMode::Duration(budget),
        }
    }
}

/// Aggregate metrics reduced from every user's samples after the join.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub success_rate: f64,
    pub throughput_rps: f64,
    pub average_response_ms: f64,
    pub median_response_ms: f64,
    pub wall_clock_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration_ms: u64,
    ok: bool,
}

/// Runs the configured user scenarios across the runtime's worker pool and
/// reduces their samples once every task has joined. A single failing request
/// is recorded as a failed sample; it never aborts sibling users.
pub async fn run<F, Fut>(options: LoadOptions, call: F) -> LoadSummary
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<ResponseFacts>> + Send,
{
    info!(
        users = options.users,
        requests_per_user = options.requests_per_user,
        "starting load run"
    );
    let started = Instant::now();

    let mut tasks = JoinSet::new();
    for _ in 0..options.users {
        let call = call.clone();
        let mode = options.mode;
        let requests = options.requests_per_user;
        tasks.spawn(async move { run_user(requests, mode, call).await });
    }

    // Join barrier: reduction only starts once every user task has finished.
    // A panicked user forfeits its samples but never blocks the others.
    let mut samples = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(user_samples) => samples.extend(user_samples),
            Err(err) => warn!(error = %err, "load user task failed to join"),
        }
    }

    reduce(&samples, started.elapsed())
}

async fn run_user<F, Fut>(requests: usize, mode: LoadMode, call: F) -> Vec<Sample>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ResponseFacts>>,
{
    let mut samples = Vec::new();
    match mode {
        LoadMode::Iterations => {
            for _ in 0..requests {
                samples.push(issue(&call).await);
            }
        }
        LoadMode::Duration(budget) => {
            let deadline = Instant::now() + budget;
            while Instant::now() < deadline {
                samples.push(issue(&call).await);
            }
        }
    }
    samples
}

async fn issue<F, Fut>(call: &F) -> Sample
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<ResponseFacts>>,
{
    let started = Instant::now();
    match call().await {
        Ok(response) => Sample {
            duration_ms: response.elapsed_ms(),
            ok: (200..300).contains(&response.status()),
        },
        Err(_) => Sample {
            duration_ms: started.elapsed().as_millis() as u64,
            ok: false,
        },
    }
}

fn reduce(samples: &[Sample], wall_clock: Duration) -> LoadSummary {
    let total_requests = samples.len();
    let successful_requests = samples.iter().filter(|s| s.ok).count();
    let failed_requests = total_requests - successful_requests;

    let success_rate = if total_requests > 0 {
        successful_requests as f64 * 100.0 / total_requests as f64
    } else {
        0.0
    };

    let wall_clock_ms = wall_clock.as_millis() as u64;
    let elapsed_ms = (wall_clock.as_secs_f64() * 1000.0).max(f64::MIN_POSITIVE);
    let throughput_rps = successful_requests as f64 * 1000.0 / elapsed_ms;

    let mut durations: Vec<u64> = samples.iter().map(|s| s.duration_ms).collect();
    durations.sort_unstable();
    let average_response_ms = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };
    let median_response_ms = median(&durations);

    LoadSummary {
        total_requests,
        successful_requests,
        failed_requests,
        success_rate,
        throughput_rps,
        average_response_ms,
        median_response_ms,
        wall_clock_ms,
    }
}

fn median(sorted: &[u64]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn response(status: u16, elapsed_ms: u64) -> ResponseFacts {
        ResponseFacts::new(status, Vec::new(), None, b"ok".to_vec(), elapsed_ms)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn all_successes_report_full_success_rate() {
        let options = LoadOptions::new(10, 5);
        let summary = run(options, || async { Ok(response(200, 20)) }).await;

        assert_eq!(summary.total_requests, 50);
        assert_eq!(summary.successful_requests, 50);
        assert_eq!(summary.failed_requests, 0);
        assert_eq!(summary.success_rate, 100.0);
        assert!(summary.throughput_rps > 0.0);
        assert_eq!(summary.average_response_ms, 20.0);
        assert_eq!(summary.median_response_ms, 20.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn partial_failures_lower_the_success_rate() {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&issued);
        let summary = run(LoadOptions::new(10, 5), move || {
            let counter = Arc::clone(&counter);
            async move {
                // Exactly two of the fifty requests hit a server error.
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(response(500, 30))
                } else {
                    Ok(response(200, 30))
                }
            }
        })
        .await;

        assert_eq!(summary.total_requests, 50);
        assert_eq!(summary.failed_requests, 2);
        assert_eq!(summary.success_rate, 96.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transport_errors_count_as_failed_samples_without_aborting() {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&issued);
        let summary = run(LoadOptions::new(2, 3), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    anyhow::bail!("connection reset")
                }
                Ok(response(204, 10))
            }
        })
        .await;

        assert_eq!(summary.total_requests, 6);
        assert_eq!(summary.failed_requests, 1);
        assert_eq!(summary.successful_requests, 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn endurance_mode_stops_at_the_deadline() {
        let options = LoadOptions::endurance(2, Duration::from_millis(50));
        let summary = run(options, || async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(response(200, 5))
        })
        .await;

        assert!(summary.total_requests > 0);
        assert!(summary.wall_clock_ms >= 50);
        assert_eq!(summary.success_rate, 100.0);
    }

    #[test]
    fn median_of_even_and_odd_sample_counts() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[10]), 10.0);
        assert_eq!(median(&[10, 20]), 15.0);
        assert_eq!(median(&[10, 20, 40]), 20.0);
        assert_eq!(median(&[10, 20, 30, 100]), 25.0);
    }

    #[test]
    fn reduce_handles_zero_samples() {
        let summary = reduce(&[], Duration::from_millis(10));
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.throughput_rps, 0.0);
        assert_eq!(summary.median_response_ms, 0.0);
    }
}
