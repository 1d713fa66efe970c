use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round1;
use crate::perception::KeypointIndex;

use super::{FrameInput, Reading, TestMeasure};

/// 垂直跳び
///
/// 録画開始直後の一定フレームで腰の基準高さをEMAで確定し、
/// 以降の最高到達点（最小y）との差をcm換算する。
/// 基準より上に到達していない間は数値を出さない。
pub struct VerticalJumpMeasure {
    baseline_frames: u32,
    alpha: f32,
    keypoint_threshold: f32,
    baseline: Option<f32>,
    frames_seen: u32,
    peak_y: Option<f32>,
    last: Reading,
}

impl VerticalJumpMeasure {
    pub fn new(config: &MeasureConfig, keypoint_threshold: f32) -> Self {
        Self {
            baseline_frames: config.baseline_frames,
            alpha: config.baseline_alpha,
            keypoint_threshold,
            baseline: None,
            frames_seen: 0,
            peak_y: None,
            last: Reading::Pending,
        }
    }

    /// 腰ペアの代表点y。腰が欠けたら足首で代用
    fn reference_y(&self, input: &FrameInput) -> Option<f32> {
        let pose = input.pose?;
        pose.bilateral_or_fallback(
            (KeypointIndex::LeftHip, KeypointIndex::RightHip),
            (KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle),
            self.keypoint_threshold,
        )
        .map(|p| p.y)
    }
}

impl TestMeasure for VerticalJumpMeasure {
    fn on_recording_start(&mut self) {
        self.baseline = None;
        self.frames_seen = 0;
        self.peak_y = None;
        self.last = Reading::Pending;
    }

    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>) {
        let Some(y) = self.reference_y(input) else {
            return;
        };

        // 基準確定フェーズ。立位のゆらぎをEMAで均す
        if self.frames_seen < self.baseline_frames {
            self.baseline = Some(match self.baseline {
                Some(b) => b * (1.0 - self.alpha) + y * self.alpha,
                None => y,
            });
            self.frames_seen += 1;
            return;
        }

        let Some(baseline) = self.baseline else {
            return;
        };
        let peak = match self.peak_y {
            Some(p) => p.min(y),
            None => y,
        };
        self.peak_y = Some(peak);

        // 画像座標は下向き正。基準より上（小さいy）に出た時だけ結果になる
        if peak < baseline {
            match scale {
                Some(scale) => {
                    let cm = scale.to_cm(baseline - peak);
                    self.last = Reading::Value(round1(cm) as f64);
                }
                None => self.last = Reading::Uncalibrated,
            }
        }
    }

    fn reading(&self) -> Reading {
        self.last
    }
}
