use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;

use workout_pose::config::Config;
use workout_pose::logging::init_logging;
use workout_pose::monitor::{JsonLinesStore, MetricsMonitor, PerformanceMetrics, Severity};
use workout_pose::pose::{average_confidence, Keypoint};
use workout_pose::tracker::SmoothingPipeline;

const CONFIG_PATH: &str = "config.toml";
const SNAPSHOT_PATH: &str = "snapshots.jsonl";
/// 約10秒ごと (30fps想定) にスナップショットを保存
const SNAPSHOT_EVERY_FRAMES: usize = 300;
const STABLE_VARIANCE: f32 = 1e-4;

/// 録画ファイルの1行 (JSON Lines)
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    timestamp_ms: i64,
    fps: f32,
    latency_ms: f32,
    keypoints: Vec<Keypoint>,
    /// セット開始フレーム。平滑化状態をリセットする
    #[serde(default)]
    new_set: bool,
}

fn load_recording(path: &str) -> Result<Vec<RecordedFrame>> {
    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("{}:{}: bad frame", path, i + 1))
        })
        .collect()
}

fn main() -> Result<()> {
    init_logging();

    // Usage: pose_replay <recording.jsonl> [session_id]
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("usage: {} <recording.jsonl> [session_id]", args[0]);
    }
    let recording_path = &args[1];
    let session_id = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| format!("replay-{}", Utc::now().timestamp()));

    let config = Config::load_or_default(CONFIG_PATH);
    let frames = load_recording(recording_path)?;

    println!("=== Pose Replay ===");
    println!("Recording: {} ({} frames)", recording_path, frames.len());
    println!("Session: {}", session_id);
    println!(
        "Smoothing: alpha={}, history={}, low_confidence<{}",
        config.smoothing.alpha,
        config.smoothing.history_size,
        config.smoothing.low_confidence_threshold
    );
    println!();

    let mut pipeline = SmoothingPipeline::from_config(&config.smoothing);
    let mut monitor = MetricsMonitor::from_config(&config.monitor);
    let mut store = JsonLinesStore::new(SNAPSHOT_PATH);

    monitor.on_alert(|issue| match issue.severity {
        Severity::Error => tracing::warn!(kind = %issue.kind, "{}", issue.message),
        Severity::Warning => tracing::info!(kind = %issue.kind, "{}", issue.message),
    });

    let mut sets = 1;
    for (i, frame) in frames.iter().enumerate() {
        if frame.new_set && i > 0 {
            pipeline.reset();
            sets += 1;
            tracing::debug!(frame = i, "new set, smoothing state reset");
        }

        let timestamp = DateTime::<Utc>::from_timestamp_millis(frame.timestamp_ms)
            .unwrap_or_else(Utc::now);
        let smoothed = pipeline.process(&frame.keypoints);

        monitor.record_metric(PerformanceMetrics::at(
            frame.fps,
            frame.latency_ms,
            average_confidence(&frame.keypoints),
            timestamp,
        ));
        monitor.record_pose(&smoothed, timestamp);

        if (i + 1) % SNAPSHOT_EVERY_FRAMES == 0 {
            monitor.save_snapshot(&session_id, &mut store);
        }
    }
    let saved = monitor.save_snapshot(&session_id, &mut store);

    let stats = pipeline.stats();
    println!();
    println!("Sets: {}", sets);
    println!("Frames smoothed: {}", stats.frames_smoothed);
    println!("Keypoints: {} seen, {} interpolated, {} low-confidence passthrough",
        stats.keypoints_seen, stats.keypoints_interpolated, stats.low_confidence_passthrough);
    println!("Pose stable: {}", if pipeline.is_stable(STABLE_VARIANCE) { "yes" } else { "no" });

    if let Some(snapshot) = monitor.snapshot() {
        println!(
            "FPS: avg {:.1} (min {:.1}, max {:.1})",
            snapshot.fps.avg, snapshot.fps.min, snapshot.fps.max
        );
        println!(
            "Latency: avg {:.0}ms (p95 {:.0}ms, max {:.0}ms)",
            snapshot.latency.avg, snapshot.latency_p95, snapshot.latency.max
        );
        println!("Confidence: avg {:.2}", snapshot.confidence.avg);
    }
    let health = monitor.health_status();
    println!("Health: {:?} - {}", health.level, health.message);
    if saved {
        println!("Snapshot saved: {}", store.path().display());
    }

    Ok(())
}
