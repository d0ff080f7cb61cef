//! Per-frame samples and the issues derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One performance sample for a processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fps: f32,
    /// End-to-end latency in milliseconds
    pub latency_ms: f32,
    /// Aggregate detection confidence for the frame (0.0..=1.0)
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceMetrics {
    /// Sample stamped with the current wall-clock time
    pub fn new(fps: f32, latency_ms: f32, confidence: f32) -> Self {
        Self::at(fps, latency_ms, confidence, Utc::now())
    }

    pub fn at(fps: f32, latency_ms: f32, confidence: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            fps,
            latency_ms,
            confidence,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Lighting,
    Distance,
    Occlusion,
    Fps,
    Latency,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lighting => "lighting",
            Self::Distance => "distance",
            Self::Occlusion => "occlusion",
            Self::Fps => "fps",
            Self::Latency => "latency",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A classified environment or performance problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl EnvironmentIssue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            timestamp,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
