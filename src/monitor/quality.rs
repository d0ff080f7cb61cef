//! Threshold evaluation for performance samples and pose framing.

use chrono::{DateTime, Utc};

use crate::config::MonitorConfig;
use crate::monitor::types::{EnvironmentIssue, IssueKind, PerformanceMetrics, Severity};
use crate::pose::{Keypoint, KeypointId};

/// Classify one sample. Issues come out in evaluation order: fps, latency, lighting.
///
/// A non-finite value is an error of its own kind.
pub fn evaluate_metrics(sample: &PerformanceMetrics, config: &MonitorConfig) -> Vec<EnvironmentIssue> {
    let ts = sample.timestamp;
    let mut issues = Vec::new();

    if !sample.fps.is_finite() {
        issues.push(EnvironmentIssue::new(
            IssueKind::Fps,
            Severity::Error,
            "Frame rate unavailable",
            ts,
        ));
    } else if sample.fps < config.fps_error {
        issues.push(EnvironmentIssue::new(
            IssueKind::Fps,
            Severity::Error,
            format!("Frame rate too low ({:.0} fps)", sample.fps),
            ts,
        ));
    } else if sample.fps < config.fps_warning {
        issues.push(EnvironmentIssue::new(
            IssueKind::Fps,
            Severity::Warning,
            format!("Frame rate below target ({:.0} fps)", sample.fps),
            ts,
        ));
    }

    if !sample.latency_ms.is_finite() {
        issues.push(EnvironmentIssue::new(
            IssueKind::Latency,
            Severity::Error,
            "Processing latency unavailable",
            ts,
        ));
    } else if sample.latency_ms > config.latency_error {
        issues.push(EnvironmentIssue::new(
            IssueKind::Latency,
            Severity::Error,
            format!("Processing latency too high ({:.0} ms)", sample.latency_ms),
            ts,
        ));
    } else if sample.latency_ms > config.latency_warning {
        issues.push(EnvironmentIssue::new(
            IssueKind::Latency,
            Severity::Warning,
            format!("Processing latency elevated ({:.0} ms)", sample.latency_ms),
            ts,
        ));
    }

    // low detection confidence is almost always lighting
    if !sample.confidence.is_finite() {
        issues.push(EnvironmentIssue::new(
            IssueKind::Lighting,
            Severity::Error,
            "Detection confidence unavailable",
            ts,
        ));
    } else if sample.confidence < config.confidence_error {
        issues.push(EnvironmentIssue::new(
            IssueKind::Lighting,
            Severity::Error,
            format!("Poor lighting, detection confidence {:.2}", sample.confidence),
            ts,
        ));
    } else if sample.confidence < config.confidence_warning {
        issues.push(EnvironmentIssue::new(
            IssueKind::Lighting,
            Severity::Warning,
            format!("Lighting could be improved, detection confidence {:.2}", sample.confidence),
            ts,
        ));
    }

    issues
}

/// Check how the body sits in the frame. Occlusion first, then distance.
///
/// Only keypoints at or above `visibility_threshold` count. Distance is judged
/// from the vertical extent of the visible keypoints and needs at least two of them.
pub fn evaluate_framing(
    keypoints: &[Keypoint],
    timestamp: DateTime<Utc>,
    config: &MonitorConfig,
) -> Vec<EnvironmentIssue> {
    let mut issues = Vec::new();
    let visible: Vec<&Keypoint> = keypoints
        .iter()
        .filter(|kp| kp.is_valid(config.visibility_threshold))
        .collect();

    if visible.is_empty() {
        issues.push(EnvironmentIssue::new(
            IssueKind::Occlusion,
            Severity::Error,
            "No body detected in frame",
            timestamp,
        ));
        return issues;
    }

    if visible.len() < config.min_visible_keypoints {
        issues.push(EnvironmentIssue::new(
            IssueKind::Occlusion,
            Severity::Warning,
            format!(
                "Only {} of {} body points visible",
                visible.len(),
                KeypointId::COUNT
            ),
            timestamp,
        ));
    }

    if visible.len() >= 2 {
        let (min_y, max_y) = visible.iter().fold((f32::MAX, f32::MIN), |(lo, hi), kp| {
            let y = kp.y.clamp(0.0, 1.0);
            (lo.min(y), hi.max(y))
        });
        let extent = max_y - min_y;
        if extent > config.too_close_extent {
            issues.push(EnvironmentIssue::new(
                IssueKind::Distance,
                Severity::Warning,
                "Too close to the camera, step back",
                timestamp,
            ));
        } else if extent < config.too_far_extent {
            issues.push(EnvironmentIssue::new(
                IssueKind::Distance,
                Severity::Warning,
                "Too far from the camera, step closer",
                timestamp,
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(fps: f32, latency_ms: f32, confidence: f32) -> PerformanceMetrics {
        PerformanceMetrics::at(fps, latency_ms, confidence, Utc::now())
    }

    fn kinds(issues: &[EnvironmentIssue]) -> Vec<(IssueKind, Severity)> {
        issues.iter().map(|i| (i.kind, i.severity)).collect()
    }

    fn body(top: f32, bottom: f32, confidence: f32) -> Vec<Keypoint> {
        KeypointId::ALL
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let t = i as f32 / (KeypointId::COUNT - 1) as f32;
                Keypoint::new(id, 0.5, top + (bottom - top) * t, confidence)
            })
            .collect()
    }

    #[test]
    fn test_healthy_sample_has_no_issues() {
        let config = MonitorConfig::default();
        assert!(evaluate_metrics(&sample(25.0, 100.0, 0.9), &config).is_empty());
    }

    #[test]
    fn test_fps_thresholds() {
        let config = MonitorConfig::default();
        assert_eq!(
            kinds(&evaluate_metrics(&sample(10.0, 100.0, 0.9), &config)),
            vec![(IssueKind::Fps, Severity::Error)]
        );
        assert_eq!(
            kinds(&evaluate_metrics(&sample(15.0, 100.0, 0.9), &config)),
            vec![(IssueKind::Fps, Severity::Warning)]
        );
        assert!(evaluate_metrics(&sample(20.0, 100.0, 0.9), &config).is_empty());
    }

    #[test]
    fn test_latency_thresholds() {
        let config = MonitorConfig::default();
        assert_eq!(
            kinds(&evaluate_metrics(&sample(30.0, 350.0, 0.9), &config)),
            vec![(IssueKind::Latency, Severity::Warning)]
        );
        assert_eq!(
            kinds(&evaluate_metrics(&sample(30.0, 500.0, 0.9), &config)),
            vec![(IssueKind::Latency, Severity::Warning)]
        );
        assert_eq!(
            kinds(&evaluate_metrics(&sample(30.0, 501.0, 0.9), &config)),
            vec![(IssueKind::Latency, Severity::Error)]
        );
        assert!(evaluate_metrics(&sample(30.0, 300.0, 0.9), &config).is_empty());
    }

    #[test]
    fn test_confidence_thresholds() {
        let config = MonitorConfig::default();
        assert_eq!(
            kinds(&evaluate_metrics(&sample(30.0, 100.0, 0.4), &config)),
            vec![(IssueKind::Lighting, Severity::Error)]
        );
        assert_eq!(
            kinds(&evaluate_metrics(&sample(30.0, 100.0, 0.5), &config)),
            vec![(IssueKind::Lighting, Severity::Warning)]
        );
        assert!(evaluate_metrics(&sample(30.0, 100.0, 0.7), &config).is_empty());
    }

    #[test]
    fn test_evaluation_order() {
        let config = MonitorConfig::default();
        let issues = evaluate_metrics(&sample(10.0, 600.0, 0.3), &config);
        assert_eq!(
            kinds(&issues),
            vec![
                (IssueKind::Fps, Severity::Error),
                (IssueKind::Latency, Severity::Error),
                (IssueKind::Lighting, Severity::Error),
            ]
        );
    }

    #[test]
    fn test_non_finite_values_are_errors() {
        let config = MonitorConfig::default();
        let issues = evaluate_metrics(&sample(f32::NAN, f32::INFINITY, f32::NAN), &config);
        assert_eq!(
            kinds(&issues),
            vec![
                (IssueKind::Fps, Severity::Error),
                (IssueKind::Latency, Severity::Error),
                (IssueKind::Lighting, Severity::Error),
            ]
        );
        assert!(issues[0].message.contains("unavailable"));
    }

    #[test]
    fn test_issue_carries_sample_timestamp() {
        let config = MonitorConfig::default();
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let issues = evaluate_metrics(&PerformanceMetrics::at(5.0, 10.0, 0.9, ts), &config);
        assert_eq!(issues[0].timestamp, ts);
    }

    #[test]
    fn test_well_framed_body() {
        let config = MonitorConfig::default();
        assert!(evaluate_framing(&body(0.1, 0.9, 0.9), Utc::now(), &config).is_empty());
    }

    #[test]
    fn test_no_visible_keypoints() {
        let config = MonitorConfig::default();
        let issues = evaluate_framing(&body(0.1, 0.9, 0.1), Utc::now(), &config);
        assert_eq!(kinds(&issues), vec![(IssueKind::Occlusion, Severity::Error)]);
        assert!(evaluate_framing(&[], Utc::now(), &config)[0].is_error());
    }

    #[test]
    fn test_partial_occlusion() {
        let config = MonitorConfig::default();
        let mut keypoints = body(0.1, 0.9, 0.9);
        for kp in keypoints.iter_mut().skip(5) {
            kp.confidence = 0.1;
        }
        let issues = evaluate_framing(&keypoints, Utc::now(), &config);
        assert_eq!(issues[0].kind, IssueKind::Occlusion);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("5 of 17"));
    }

    #[test]
    fn test_distance() {
        let config = MonitorConfig::default();
        let close = evaluate_framing(&body(0.0, 1.0, 0.9), Utc::now(), &config);
        assert_eq!(kinds(&close), vec![(IssueKind::Distance, Severity::Warning)]);
        assert!(close[0].message.contains("close"));

        let far = evaluate_framing(&body(0.4, 0.6, 0.9), Utc::now(), &config);
        assert_eq!(kinds(&far), vec![(IssueKind::Distance, Severity::Warning)]);
        assert!(far[0].message.contains("far"));
    }
}
