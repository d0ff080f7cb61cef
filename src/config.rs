use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmoothingConfig {
    /// EMA係数 (0, 1]。大きいほど追従が速く、小さいほど滑らか
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// ランドマークごとに保持する平滑化済み座標の数
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// これ未満の信頼度は履歴から補間する
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f32,
    /// 補間時の信頼度減衰率 [0, 1) (連続欠損ごとに乗算)
    #[serde(default = "default_confidence_decay")]
    pub confidence_decay: f32,
}

fn default_alpha() -> f32 { 0.5 }
fn default_history_size() -> usize { 10 }
fn default_low_confidence_threshold() -> f32 { 0.3 }
fn default_confidence_decay() -> f32 { 0.8 }

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            history_size: default_history_size(),
            low_confidence_threshold: default_low_confidence_threshold(),
            confidence_decay: default_confidence_decay(),
        }
    }
}

impl SmoothingConfig {
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            bail!("smoothing.alpha must be in (0, 1], got {}", self.alpha);
        }
        if self.history_size == 0 {
            bail!("smoothing.history_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            bail!(
                "smoothing.low_confidence_threshold must be in [0, 1], got {}",
                self.low_confidence_threshold
            );
        }
        if !(0.0..1.0).contains(&self.confidence_decay) {
            bail!(
                "smoothing.confidence_decay must be in [0, 1), got {}",
                self.confidence_decay
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// 保持するフレームサンプル数
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,
    /// 保持する問題ログの件数
    #[serde(default = "default_issue_capacity")]
    pub issue_capacity: usize,
    /// スナップショットの集計対象サンプル数
    #[serde(default = "default_snapshot_window")]
    pub snapshot_window: usize,
    /// スナップショットに含める直近の問題数
    #[serde(default = "default_recent_issues")]
    pub recent_issues: usize,
    #[serde(default = "default_fps_error")]
    pub fps_error: f32,
    #[serde(default = "default_fps_warning")]
    pub fps_warning: f32,
    /// ms
    #[serde(default = "default_latency_error")]
    pub latency_error: f32,
    /// ms
    #[serde(default = "default_latency_warning")]
    pub latency_warning: f32,
    #[serde(default = "default_confidence_error")]
    pub confidence_error: f32,
    #[serde(default = "default_confidence_warning")]
    pub confidence_warning: f32,
    /// 可視とみなすキーポイント信頼度
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    /// これ未満の可視キーポイント数で遮蔽と判定
    #[serde(default = "default_min_visible_keypoints")]
    pub min_visible_keypoints: usize,
    /// 可視キーポイントの縦幅 (正規化) がこれを超えたら近すぎ
    #[serde(default = "default_too_close_extent")]
    pub too_close_extent: f32,
    /// 可視キーポイントの縦幅 (正規化) がこれ未満なら遠すぎ
    #[serde(default = "default_too_far_extent")]
    pub too_far_extent: f32,
}

fn default_metrics_capacity() -> usize { 100 }
fn default_issue_capacity() -> usize { 50 }
fn default_snapshot_window() -> usize { 30 }
fn default_recent_issues() -> usize { 10 }
fn default_fps_error() -> f32 { 15.0 }
fn default_fps_warning() -> f32 { 20.0 }
fn default_latency_error() -> f32 { 500.0 }
fn default_latency_warning() -> f32 { 300.0 }
fn default_confidence_error() -> f32 { 0.5 }
fn default_confidence_warning() -> f32 { 0.7 }
fn default_visibility_threshold() -> f32 { 0.5 }
fn default_min_visible_keypoints() -> usize { 8 }
fn default_too_close_extent() -> f32 { 0.95 }
fn default_too_far_extent() -> f32 { 0.3 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metrics_capacity: default_metrics_capacity(),
            issue_capacity: default_issue_capacity(),
            snapshot_window: default_snapshot_window(),
            recent_issues: default_recent_issues(),
            fps_error: default_fps_error(),
            fps_warning: default_fps_warning(),
            latency_error: default_latency_error(),
            latency_warning: default_latency_warning(),
            confidence_error: default_confidence_error(),
            confidence_warning: default_confidence_warning(),
            visibility_threshold: default_visibility_threshold(),
            min_visible_keypoints: default_min_visible_keypoints(),
            too_close_extent: default_too_close_extent(),
            too_far_extent: default_too_far_extent(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.metrics_capacity == 0 || self.issue_capacity == 0 || self.snapshot_window == 0 {
            bail!("monitor buffer sizes must be at least 1");
        }
        if self.fps_error > self.fps_warning {
            bail!(
                "monitor.fps_error ({}) must not exceed monitor.fps_warning ({})",
                self.fps_error,
                self.fps_warning
            );
        }
        if self.latency_warning > self.latency_error {
            bail!(
                "monitor.latency_warning ({}) must not exceed monitor.latency_error ({})",
                self.latency_warning,
                self.latency_error
            );
        }
        if self.confidence_error > self.confidence_warning {
            bail!(
                "monitor.confidence_error ({}) must not exceed monitor.confidence_warning ({})",
                self.confidence_error,
                self.confidence_warning
            );
        }
        if self.too_far_extent >= self.too_close_extent {
            bail!("monitor.too_far_extent must be smaller than monitor.too_close_extent");
        }
        Ok(())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.smoothing.validate()?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト値で続行する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %format!("{e:#}"),
                    "using default configuration"
                );
                Self::default()
            }
        }
    }
}
