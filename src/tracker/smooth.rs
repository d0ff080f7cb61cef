use serde::Serialize;

use crate::config::SmoothingConfig;
use crate::pose::{Keypoint, KeypointId};
use crate::tracker::history::History;

/// 補間した点の信頼度は必ず下がる
const MAX_CONFIDENCE_DECAY: f32 = 0.99;

/// ランドマーク1点分のフィルタ状態
#[derive(Debug, Clone)]
struct LandmarkState {
    /// 現在のEMA値
    smoothed: (f32, f32),
    history: History,
    /// 連続した低信頼度フレーム数
    misses: i32,
}

/// パイプラインの累計カウンタ。`reset` でゼロに戻る
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_smoothed: u64,
    pub keypoints_seen: u64,
    /// 履歴の値で置き換えたキーポイント数
    pub keypoints_interpolated: u64,
    /// 低信頼度だが履歴がなくそのまま通したキーポイント数
    pub low_confidence_passthrough: u64,
}

/// キーポイント平滑化パイプライン
///
/// ランドマークごとのEMAと、低信頼度キーポイントの履歴補間を行う。
/// 出力座標は常に [0, 1] にクランプされる。状態は初回観測時に作られ、
/// `reset` で全て破棄される。
pub struct SmoothingPipeline {
    alpha: f32,
    history_size: usize,
    low_confidence_threshold: f32,
    confidence_decay: f32,
    landmarks: [Option<LandmarkState>; KeypointId::COUNT],
    stats: PipelineStats,
}

impl SmoothingPipeline {
    pub fn new(alpha: f32) -> Self {
        Self::from_config(&SmoothingConfig::default().with_alpha(alpha))
    }

    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self {
            alpha: sanitize_unit(config.alpha, 0.5).max(f32::EPSILON),
            history_size: config.history_size.max(1),
            low_confidence_threshold: sanitize_unit(config.low_confidence_threshold, 0.3),
            confidence_decay: sanitize_unit(config.confidence_decay, 0.8).min(MAX_CONFIDENCE_DECAY),
            landmarks: std::array::from_fn(|_| None),
            stats: PipelineStats::default(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn low_confidence_threshold(&self) -> f32 {
        self.low_confidence_threshold
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// 状態を持っているランドマーク数
    pub fn tracked_landmarks(&self) -> usize {
        self.landmarks.iter().filter(|s| s.is_some()).count()
    }

    /// バッチ全体をEMAで平滑化する。信頼度はそのまま通す
    pub fn smooth(&mut self, keypoints: &[Keypoint]) -> Vec<Keypoint> {
        self.stats.frames_smoothed += 1;
        self.stats.keypoints_seen += keypoints.len() as u64;
        keypoints.iter().map(|kp| self.smooth_one(kp)).collect()
    }

    fn smooth_one(&mut self, kp: &Keypoint) -> Keypoint {
        let alpha = self.alpha;
        let history_size = self.history_size;
        let slot = &mut self.landmarks[kp.id.index()];

        let (x, y) = match slot {
            Some(state) => {
                let (prev_x, prev_y) = state.smoothed;
                let raw_x = sanitize_unit(kp.x, prev_x);
                let raw_y = sanitize_unit(kp.y, prev_y);
                let x = alpha * raw_x + (1.0 - alpha) * prev_x;
                let y = alpha * raw_y + (1.0 - alpha) * prev_y;
                state.smoothed = (x, y);
                state.history.push(x, y);
                (x, y)
            }
            None => {
                // 初回: クランプしてそのまま状態に入れる
                let x = sanitize_unit(kp.x, 0.0);
                let y = sanitize_unit(kp.y, 0.0);
                let mut history = History::new(history_size);
                history.push(x, y);
                *slot = Some(LandmarkState {
                    smoothed: (x, y),
                    history,
                    misses: 0,
                });
                (x, y)
            }
        };

        kp.with_position(clamp_unit(x), clamp_unit(y))
    }

    /// 低信頼度のキーポイントを直近の平滑化済み座標で置き換える
    ///
    /// 置き換えた点の信頼度は `confidence * decay^n` (n は連続欠損数) に下げる。
    /// 閾値以上の点、および履歴のない点はそのまま返す。
    pub fn interpolate_low_confidence(&mut self, keypoints: &[Keypoint]) -> Vec<Keypoint> {
        keypoints.iter().map(|kp| self.interpolate_one(kp)).collect()
    }

    fn interpolate_one(&mut self, kp: &Keypoint) -> Keypoint {
        let decay = self.confidence_decay;
        let slot = &mut self.landmarks[kp.id.index()];

        if kp.is_valid(self.low_confidence_threshold) || kp.confidence.is_nan() {
            if let Some(state) = slot {
                state.misses = 0;
            }
            return *kp;
        }

        let carried = slot.as_mut().and_then(|state| {
            let latest = state.history.latest()?;
            state.misses = state.misses.saturating_add(1);
            Some((latest, state.misses))
        });

        match carried {
            Some(((x, y), misses)) => {
                self.stats.keypoints_interpolated += 1;
                Keypoint {
                    x: clamp_unit(x),
                    y: clamp_unit(y),
                    confidence: kp.confidence * decay.powi(misses),
                    ..*kp
                }
            }
            None => {
                self.stats.low_confidence_passthrough += 1;
                *kp
            }
        }
    }

    /// 1フレーム分の処理: 低信頼度補間 → 平滑化
    pub fn process(&mut self, keypoints: &[Keypoint]) -> Vec<Keypoint> {
        let carried = self.interpolate_low_confidence(keypoints);
        self.smooth(&carried)
    }

    /// ランドマーク履歴の軸ごとの母分散。履歴が2点未満なら (0, 0)
    pub fn variance(&self, id: KeypointId) -> (f32, f32) {
        self.landmarks[id.index()]
            .as_ref()
            .map_or((0.0, 0.0), |state| state.history.variance())
    }

    /// 全ランドマークの分散が両軸とも閾値以下なら true
    pub fn is_stable(&self, threshold: f32) -> bool {
        self.landmarks.iter().flatten().all(|state| {
            let (vx, vy) = state.history.variance();
            vx <= threshold && vy <= threshold
        })
    }

    pub fn reset(&mut self) {
        for slot in &mut self.landmarks {
            *slot = None;
        }
        self.stats = PipelineStats::default();
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// NaN は fallback、それ以外は [0, 1] にクランプ
fn sanitize_unit(v: f32, fallback: f32) -> f32 {
    if v.is_nan() {
        fallback
    } else {
        v.clamp(0.0, 1.0)
    }
}
