//! Windowed aggregates over recent samples, and the health verdict derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MonitorConfig;
use crate::monitor::store::SnapshotRecord;
use crate::monitor::types::{EnvironmentIssue, PerformanceMetrics, Severity};

/// Average / min / max of one metric over the snapshot window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

impl Aggregate {
    /// Non-finite values are skipped; `None` if nothing finite is left
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            count += 1;
            sum += f64::from(v);
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            avg: (sum / count as f64) as f32,
            min,
            max,
        })
    }
}

/// Read-only aggregate over the most recent samples.
///
/// Computed on demand by [`MetricsMonitor::snapshot`](crate::monitor::MetricsMonitor::snapshot);
/// never stored by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Number of samples the aggregates cover
    pub sample_count: usize,
    pub fps: Aggregate,
    pub latency: Aggregate,
    pub confidence: Aggregate,
    /// Nearest-rank 95th percentile latency (ms)
    pub latency_p95: f32,
    /// Most recent issues, oldest first
    pub recent_issues: Vec<EnvironmentIssue>,
}

impl MetricsSnapshot {
    pub(crate) fn compute<'a>(
        samples: impl Iterator<Item = &'a PerformanceMetrics> + Clone,
        recent_issues: Vec<EnvironmentIssue>,
    ) -> Option<Self> {
        let sample_count = samples.clone().count();
        if sample_count == 0 {
            return None;
        }
        // a window with no finite value for a metric reports zeros for it
        let aggregate = |values: Vec<f32>| Aggregate::from_values(values).unwrap_or_default();
        let fps = aggregate(samples.clone().map(|s| s.fps).collect());
        let latency = aggregate(samples.clone().map(|s| s.latency_ms).collect());
        let confidence = aggregate(samples.clone().map(|s| s.confidence).collect());
        let mut latencies: Vec<f32> = samples
            .map(|s| s.latency_ms)
            .filter(|v| v.is_finite())
            .collect();

        Some(Self {
            sample_count,
            fps,
            latency,
            confidence,
            latency_p95: percentile(&mut latencies, 0.95),
            recent_issues,
        })
    }

    /// Health verdict: recent errors, then recent warnings, then soft average thresholds
    pub fn health(&self, config: &MonitorConfig) -> HealthStatus {
        let latest_with = |severity: Severity| {
            self.recent_issues
                .iter()
                .rev()
                .find(|issue| issue.severity == severity)
        };

        if let Some(issue) = latest_with(Severity::Error) {
            return HealthStatus::new(HealthLevel::Error, issue.message.clone());
        }
        if let Some(issue) = latest_with(Severity::Warning) {
            return HealthStatus::new(HealthLevel::Warning, issue.message.clone());
        }
        if self.fps.avg < config.fps_warning
            || self.latency.avg > config.latency_warning
            || self.confidence.avg < config.confidence_warning
        {
            return HealthStatus::new(
                HealthLevel::Warning,
                "Tracking performance below recommended levels",
            );
        }
        HealthStatus::new(HealthLevel::Good, "Tracking quality is good")
    }

    pub fn to_record(&self, session_id: &str, timestamp: DateTime<Utc>) -> SnapshotRecord {
        SnapshotRecord {
            session_id: session_id.to_string(),
            fps: self.fps,
            latency: self.latency,
            confidence: self.confidence,
            latency_p95: self.latency_p95,
            issues: self.recent_issues.clone(),
            timestamp,
        }
    }
}

/// Nearest-rank percentile; sorts `values` in place. 0.0 when empty.
fn percentile(values: &mut [f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (p * values.len() as f32).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Good,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub level: HealthLevel,
    pub message: String,
}

impl HealthStatus {
    pub fn new(level: HealthLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::IssueKind;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn samples(values: &[(f32, f32, f32)]) -> Vec<PerformanceMetrics> {
        values
            .iter()
            .map(|&(fps, latency, conf)| PerformanceMetrics::at(fps, latency, conf, Utc::now()))
            .collect()
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(Aggregate::from_values(std::iter::empty()).is_none());
        assert!(Aggregate::from_values([f32::NAN, f32::INFINITY]).is_none());
    }

    #[test]
    fn test_aggregate_values() {
        let agg = Aggregate::from_values([10.0, 20.0, 30.0]).unwrap();
        assert!(approx_eq_f32(agg.avg, 20.0, 1e-6));
        assert_eq!(agg.min, 10.0);
        assert_eq!(agg.max, 30.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let mut values: Vec<f32> = (1..=20).map(|v| v as f32).collect();
        assert_eq!(percentile(&mut values, 0.95), 19.0);
        assert_eq!(percentile(&mut [42.0], 0.95), 42.0);
        assert_eq!(percentile(&mut [], 0.95), 0.0);
    }

    #[test]
    fn test_compute() {
        let s = samples(&[(30.0, 100.0, 0.9), (20.0, 200.0, 0.7)]);
        let snap = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap();
        assert_eq!(snap.sample_count, 2);
        assert!(approx_eq_f32(snap.fps.avg, 25.0, 1e-5));
        assert_eq!(snap.latency.max, 200.0);
        assert!(approx_eq_f32(snap.confidence.min, 0.7, 1e-6));
        assert_eq!(snap.latency_p95, 200.0);
    }

    #[test]
    fn test_non_finite_samples_skipped() {
        let s = samples(&[
            (30.0, 100.0, 0.9),
            (f32::NAN, f32::INFINITY, f32::NAN),
            (20.0, 200.0, 0.7),
        ]);
        let snap = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap();
        assert_eq!(snap.sample_count, 3);
        assert!(approx_eq_f32(snap.fps.avg, 25.0, 1e-5));
        assert_eq!(snap.latency.max, 200.0);
        assert_eq!(snap.latency_p95, 200.0);
        assert!(approx_eq_f32(snap.confidence.avg, 0.8, 1e-5));
    }

    #[test]
    fn test_all_nan_window_is_not_healthy() {
        let config = MonitorConfig::default();
        let s = samples(&[(f32::NAN, f32::NAN, f32::NAN)]);
        let snap = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap();
        assert_eq!(snap.fps, Aggregate::default());
        assert_eq!(snap.health(&config).level, HealthLevel::Warning);
    }

    #[test]
    fn test_compute_empty() {
        assert!(MetricsSnapshot::compute(Vec::<PerformanceMetrics>::new().iter(), Vec::new()).is_none());
    }

    #[test]
    fn test_health_prefers_errors() {
        let config = MonitorConfig::default();
        let s = samples(&[(30.0, 100.0, 0.9)]);
        let issues = vec![
            EnvironmentIssue::new(IssueKind::Fps, Severity::Error, "fps bad", Utc::now()),
            EnvironmentIssue::new(IssueKind::Latency, Severity::Warning, "slow", Utc::now()),
        ];
        let health = MetricsSnapshot::compute(s.iter(), issues).unwrap().health(&config);
        assert_eq!(health.level, HealthLevel::Error);
        assert_eq!(health.message, "fps bad");
    }

    #[test]
    fn test_health_warning_issue() {
        let config = MonitorConfig::default();
        let s = samples(&[(30.0, 100.0, 0.9)]);
        let issues = vec![EnvironmentIssue::new(
            IssueKind::Lighting,
            Severity::Warning,
            "dim",
            Utc::now(),
        )];
        let health = MetricsSnapshot::compute(s.iter(), issues).unwrap().health(&config);
        assert_eq!(health, HealthStatus::new(HealthLevel::Warning, "dim"));
    }

    #[test]
    fn test_health_soft_thresholds() {
        let config = MonitorConfig::default();
        // no issues recorded, but the window average is under target
        let s = samples(&[(19.0, 100.0, 0.9)]);
        let health = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap().health(&config);
        assert_eq!(health.level, HealthLevel::Warning);

        let s = samples(&[(30.0, 100.0, 0.9)]);
        let health = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap().health(&config);
        assert_eq!(health.level, HealthLevel::Good);
    }

    #[test]
    fn test_to_record() {
        let s = samples(&[(30.0, 100.0, 0.9)]);
        let snap = MetricsSnapshot::compute(s.iter(), Vec::new()).unwrap();
        let ts = Utc::now();
        let record = snap.to_record("session-1", ts);
        assert_eq!(record.session_id, "session-1");
        assert_eq!(record.fps, snap.fps);
        assert_eq!(record.timestamp, ts);
    }
}
