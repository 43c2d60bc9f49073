use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::analytics::Report;

/// Writes the report as pretty-printed JSON, creating parent directories as
/// needed. The camelCase field names are the schema existing dashboards read.
pub fn export_json(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report).context("serializing analytics report")?;
    fs::write(path, json)
        .with_context(|| format!("writing analytics report to {}", path.display()))?;
    info!(path = %path.display(), "analytics report exported");
    Ok(())
}

/// Renders the report as a self-contained HTML dashboard.
pub fn export_html(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, render_dashboard(report))
        .with_context(|| format!("writing HTML dashboard to {}", path.display()))?;
    info!(path = %path.display(), "HTML dashboard exported");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {}", parent.display()))?;
    }
    Ok(())
}

fn render_dashboard(report: &Report) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>API Test Analytics Dashboard</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }}
.container {{ max-width: 1200px; margin: 0 auto; }}
.card {{ background: white; padding: 20px; margin: 20px 0; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
.metric {{ display: inline-block; margin: 10px 20px; text-align: center; }}
.metric-value {{ font-size: 2em; font-weight: bold; color: #2196F3; }}
.metric-label {{ font-size: 0.9em; color: #666; }}
.pass {{ color: #4CAF50; }}
.fail {{ color: #F44336; }}
table {{ width: 100%; border-collapse: collapse; margin: 10px 0; }}
th, td {{ padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }}
th {{ background-color: #f2f2f2; }}
</style>
</head>
<body>
<div class="container">
<h1>API Test Analytics Dashboard</h1>
<p>Generated on: {generated}</p>
<div class="card">
<h2>Test Execution Summary</h2>
<div class="metric"><div class="metric-value">{total}</div><div class="metric-label">Total Tests</div></div>
<div class="metric"><div class="metric-value pass">{passed}</div><div class="metric-label">Passed</div></div>
<div class="metric"><div class="metric-value fail">{failed}</div><div class="metric-label">Failed</div></div>
<div class="metric"><div class="metric-value">{pass_rate:.1}%</div><div class="metric-label">Pass Rate</div></div>
<div class="metric"><div class="metric-value">{avg:.0}ms</div><div class="metric-label">Avg Duration</div></div>
</div>
<div class="card">
<h2>Test Categories</h2>
<table>
<tr><th>Category</th><th>Count</th><th>Percentage</th></tr>
{category_rows}
</table>
</div>
<div class="card">
<h2>Stability Metrics</h2>
<div class="metric"><div class="metric-value">{consistency:.1}%</div><div class="metric-label">Consistency Score</div></div>
<div class="metric"><div class="metric-value fail">{flaky}</div><div class="metric-label">Flaky Tests</div></div>
</div>
<div class="card">
<h2>Performance Trends</h2>
<table>
<tr><th>Test</th><th>Avg Duration</th><th>Min</th><th>Max</th><th>Trend</th></tr>
{trend_rows}
</table>
</div>
</div>
</body>
</html>
"#,
        generated = Utc::now().format("%Y-%m-%d %H:%M:%S"),
        total = report.total_tests,
        passed = report.passed_tests,
        failed = report.failed_tests,
        pass_rate = report.pass_rate,
        avg = report.average_execution_time,
        category_rows = category_rows(report),
        consistency = report.stability_metrics.consistency_score,
        flaky = report.stability_metrics.flaky_tests.len(),
        trend_rows = trend_rows(report),
    )
}

fn category_rows(report: &Report) -> String {
    let mut rows = String::new();
    for (category, count) in &report.category_breakdown {
        let percentage = if report.total_tests > 0 {
            *count as f64 * 100.0 / report.total_tests as f64
        } else {
            0.0
        };
        let _ = writeln!(
            rows,
            "<tr><td>{category}</td><td>{count}</td><td>{percentage:.1}%</td></tr>"
        );
    }
    rows
}

fn trend_rows(report: &Report) -> String {
    let mut rows = String::new();
    for trend in report.performance_trends.values() {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{:.0}ms</td><td>{:.0}ms</td><td>{:.0}ms</td><td>{}</td></tr>",
            trend.test_name,
            trend.average_duration,
            trend.min_duration,
            trend.max_duration,
            trend.trend_direction.as_str(),
        );
    }
    rows
}
