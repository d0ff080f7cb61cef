use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::config::MonitorConfig;
use crate::monitor::quality::{evaluate_framing, evaluate_metrics};
use crate::monitor::snapshot::{HealthLevel, HealthStatus, MetricsSnapshot};
use crate::monitor::store::SnapshotStore;
use crate::monitor::types::{EnvironmentIssue, PerformanceMetrics};
use crate::pose::Keypoint;

/// Alert subscriber. Runs inline with `record_*`, so it must return quickly.
pub type AlertCallback = Box<dyn FnMut(&EnvironmentIssue) + Send>;

/// Handle returned by [`MetricsMonitor::on_alert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertSubscription(u64);

/// Live performance and environment monitor for the camera/pose loop.
///
/// Keeps bounded buffers of samples and issues, classifies each sample as it
/// arrives and fans new issues out to subscribers synchronously, in
/// registration order.
pub struct MetricsMonitor {
    config: MonitorConfig,
    metrics: VecDeque<PerformanceMetrics>,
    issues: VecDeque<EnvironmentIssue>,
    subscribers: Vec<(AlertSubscription, AlertCallback)>,
    next_subscription: u64,
}

impl MetricsMonitor {
    pub fn new() -> Self {
        Self::from_config(&MonitorConfig::default())
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        let mut config = config.clone();
        config.metrics_capacity = config.metrics_capacity.max(1);
        config.issue_capacity = config.issue_capacity.max(1);
        config.snapshot_window = config.snapshot_window.max(1);
        Self {
            metrics: VecDeque::with_capacity(config.metrics_capacity),
            issues: VecDeque::with_capacity(config.issue_capacity),
            config,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record one frame sample and raise any issues it triggers.
    ///
    /// Returns the issues raised for this sample, in evaluation order.
    pub fn record_metric(&mut self, sample: PerformanceMetrics) -> Vec<EnvironmentIssue> {
        if self.metrics.len() == self.config.metrics_capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(sample);

        let issues = evaluate_metrics(&sample, &self.config);
        for issue in &issues {
            self.raise(issue.clone());
        }
        issues
    }

    /// Check framing (occlusion, distance) of one frame's keypoints.
    ///
    /// Does not add a performance sample.
    pub fn record_pose(
        &mut self,
        keypoints: &[Keypoint],
        timestamp: DateTime<Utc>,
    ) -> Vec<EnvironmentIssue> {
        let issues = evaluate_framing(keypoints, timestamp, &self.config);
        for issue in &issues {
            self.raise(issue.clone());
        }
        issues
    }

    fn raise(&mut self, issue: EnvironmentIssue) {
        tracing::debug!(
            kind = %issue.kind,
            severity = %issue.severity,
            message = %issue.message,
            "environment issue"
        );

        for (_, callback) in self.subscribers.iter_mut() {
            callback(&issue);
        }

        if self.issues.len() == self.config.issue_capacity {
            self.issues.pop_front();
        }
        self.issues.push_back(issue);
    }

    pub fn on_alert<F>(&mut self, callback: F) -> AlertSubscription
    where
        F: FnMut(&EnvironmentIssue) + Send + 'static,
    {
        let id = AlertSubscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the subscription was already removed
    pub fn remove_alert(&mut self, subscription: AlertSubscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription);
        self.subscribers.len() != before
    }

    /// Aggregate over the last `snapshot_window` samples; `None` until a sample is recorded
    pub fn snapshot(&self) -> Option<MetricsSnapshot> {
        let skip = self.metrics.len().saturating_sub(self.config.snapshot_window);
        let skip_issues = self.issues.len().saturating_sub(self.config.recent_issues);
        let recent_issues = self.issues.iter().skip(skip_issues).cloned().collect();
        MetricsSnapshot::compute(self.metrics.iter().skip(skip), recent_issues)
    }

    /// Persist the current snapshot. Failures are logged, never returned.
    ///
    /// Returns true if a record was written.
    pub fn save_snapshot(&self, session_id: &str, store: &mut dyn SnapshotStore) -> bool {
        let Some(snapshot) = self.snapshot() else {
            tracing::debug!(session_id, "no samples recorded, skipping snapshot");
            return false;
        };

        let record = snapshot.to_record(session_id, Utc::now());
        match store.save(&record) {
            Ok(()) => {
                tracing::debug!(session_id, samples = snapshot.sample_count, "metrics snapshot saved");
                true
            }
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %format!("{e:#}"),
                    "failed to save metrics snapshot"
                );
                false
            }
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        match self.snapshot() {
            Some(snapshot) => snapshot.health(&self.config),
            None => HealthStatus::new(HealthLevel::Good, "Waiting for camera data"),
        }
    }

    /// Empties the sample buffer and the issue log. Subscribers stay registered.
    pub fn clear(&mut self) {
        self.metrics.clear();
        self.issues.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.metrics.len()
    }

    /// Issue log, oldest first
    pub fn issues(&self) -> impl Iterator<Item = &EnvironmentIssue> + '_ {
        self.issues.iter()
    }
}

impl Default for MetricsMonitor {
    fn default() -> Self {
        Self::new()
    }
}
