use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round1;
use crate::perception::KeypointIndex;

use super::{FrameInput, Reading, TestMeasure};

/// 立ち幅跳び
///
/// つま先代表点のx基準位置を録画開始直後のフレームでEMA確定し、
/// 以降の最大水平移動量をcm換算する。横から撮る前提。
pub struct BroadJumpMeasure {
    baseline_frames: u32,
    alpha: f32,
    keypoint_threshold: f32,
    baseline_x: Option<f32>,
    frames_seen: u32,
    max_dx: f32,
    last: Reading,
}

impl BroadJumpMeasure {
    pub fn new(config: &MeasureConfig, keypoint_threshold: f32) -> Self {
        Self {
            baseline_frames: config.baseline_frames,
            alpha: config.baseline_alpha,
            keypoint_threshold,
            baseline_x: None,
            frames_seen: 0,
            max_dx: 0.0,
            last: Reading::Pending,
        }
    }

    fn toe_x(&self, input: &FrameInput) -> Option<f32> {
        let pose = input.pose?;
        pose.bilateral_or_fallback(
            (KeypointIndex::LeftFootIndex, KeypointIndex::RightFootIndex),
            (KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle),
            self.keypoint_threshold,
        )
        .map(|p| p.x)
    }
}

impl TestMeasure for BroadJumpMeasure {
    fn on_recording_start(&mut self) {
        self.baseline_x = None;
        self.frames_seen = 0;
        self.max_dx = 0.0;
        self.last = Reading::Pending;
    }

    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>) {
        let Some(x) = self.toe_x(input) else {
            return;
        };

        if self.frames_seen < self.baseline_frames {
            self.baseline_x = Some(match self.baseline_x {
                Some(b) => b * (1.0 - self.alpha) + x * self.alpha,
                None => x,
            });
            self.frames_seen += 1;
            return;
        }

        let Some(baseline) = self.baseline_x else {
            return;
        };
        // 跳ぶ向きに依存しないよう絶対値を取る
        let dx = (x - baseline).abs();
        if dx > self.max_dx {
            self.max_dx = dx;
        }

        if self.max_dx > 0.0 {
            match scale {
                Some(scale) => {
                    let cm = scale.to_cm(self.max_dx);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{Keypoint, Pose};
    use std::time::Duration;

    fn pose_with_toes_at(x: f32) -> Pose {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::LeftFootIndex as usize] = Keypoint::new(x, 600.0, 0.9);
        keypoints[KeypointIndex::RightFootIndex as usize] = Keypoint::new(x, 610.0, 0.9);
        Pose::new(keypoints)
    }

    fn feed(measure: &mut BroadJumpMeasure, x: f32, scale: Option<PxPerCm>) {
        let pose = pose_with_toes_at(x);
        let input = FrameInput {
            elapsed: Duration::ZERO,
            width: 1280,
            height: 720,
            persons: &[],
            pose: Some(&pose),
            pixels: None,
        };
        measure.update(&input, scale);
    }

    #[test]
    fn test_max_horizontal_displacement() {
        let mut measure = BroadJumpMeasure::new(&MeasureConfig::default(), 0.3);
        measure.on_recording_start();
        let scale = PxPerCm::new(5.0);
        for _ in 0..30 {
            feed(&mut measure, 200.0, scale);
        }
        // 着地で少し戻っても最大値を保持: max |Δx| = 900px = 180.0cm
        for x in [400.0, 800.0, 1100.0, 1050.0] {
            feed(&mut measure, x, scale);
        }
        assert_eq!(measure.reading(), Reading::Value(180.0));
    }

    #[test]
    fn test_leftward_jump_measures_the_same() {
        let mut measure = BroadJumpMeasure::new(&MeasureConfig::default(), 0.3);
        measure.on_recording_start();
        let scale = PxPerCm::new(5.0);
        for _ in 0..30 {
            feed(&mut measure, 1100.0, scale);
        }
        feed(&mut measure, 200.0, scale);
        assert_eq!(measure.reading(), Reading::Value(180.0));
    }

    #[test]
    fn test_without_scale_reports_uncalibrated() {
        let mut measure = BroadJumpMeasure::new(&MeasureConfig::default(), 0.3);
        measure.on_recording_start();
        for _ in 0..30 {
            feed(&mut measure, 200.0, None);
        }
        feed(&mut measure, 500.0, None);
        assert_eq!(measure.reading(), Reading::Uncalibrated);
    }
}
