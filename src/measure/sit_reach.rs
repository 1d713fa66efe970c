use crate::calibration::PxPerCm;
use crate::geometry::round1;
use crate::perception::KeypointIndex;

use super::{FrameInput, Reading, TestMeasure};

/// 長座体前屈
///
/// 手首ペアの代表点とつま先（無ければ足首）代表点の距離を
/// フレームごとにcm換算する。姿勢が欠けたフレームでは
/// 直前の値を保持する。
pub struct SitReachMeasure {
    keypoint_threshold: f32,
    last: Reading,
}

impl SitReachMeasure {
    pub fn new(keypoint_threshold: f32) -> Self {
        Self {
            keypoint_threshold,
            last: Reading::Pending,
        }
    }
}

impl TestMeasure for SitReachMeasure {
    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>) {
        let Some(pose) = input.pose else {
            return;
        };
        let thr = self.keypoint_threshold;

        let Some(wrists) =
            pose.bilateral((KeypointIndex::LeftWrist, KeypointIndex::RightWrist), thr)
        else {
            return;
        };
        let Some(feet) = pose.bilateral_or_fallback(
            (KeypointIndex::LeftFootIndex, KeypointIndex::RightFootIndex),
            (KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle),
            thr,
        ) else {
            return;
        };

        let Some(scale) = scale else {
            if self.last == Reading::Pending {
                self.last = Reading::Uncalibrated;
            }
            return;
        };

        let cm = scale.to_cm(wrists.distance(&feet));
        self.last = Reading::Value(round1(cm) as f64);
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

    fn pose_with(points: &[(KeypointIndex, f32, f32)]) -> Pose {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for &(idx, x, y) in points {
            keypoints[idx as usize] = Keypoint::new(x, y, 0.9);
        }
        Pose::new(keypoints)
    }

    fn input<'a>(pose: &'a Pose) -> FrameInput<'a> {
        FrameInput {
            elapsed: Duration::ZERO,
            width: 1280,
            height: 720,
            persons: &[],
            pose: Some(pose),
            pixels: None,
        }
    }

    #[test]
    fn test_wrist_to_toe_distance() {
        let mut measure = SitReachMeasure::new(0.3);
        let scale = PxPerCm::new(10.0);

        let pose = pose_with(&[
            (KeypointIndex::LeftWrist, 100.0, 300.0),
            (KeypointIndex::RightWrist, 100.0, 310.0),
            (KeypointIndex::LeftFootIndex, 250.0, 300.0),
            (KeypointIndex::RightFootIndex, 250.0, 310.0),
        ]);
        measure.update(&input(&pose), scale);
        // 手首代表(100,305) → つま先代表(250,305): 150px = 15.0cm
        assert_eq!(measure.reading(), Reading::Value(15.0));
    }

    #[test]
    fn test_falls_back_to_ankles() {
        let mut measure = SitReachMeasure::new(0.3);
        let scale = PxPerCm::new(10.0);

        let pose = pose_with(&[
            (KeypointIndex::LeftWrist, 100.0, 300.0),
            (KeypointIndex::LeftAnkle, 200.0, 300.0),
        ]);
        measure.update(&input(&pose), scale);
        assert_eq!(measure.reading(), Reading::Value(10.0));
    }

    #[test]
    fn test_missing_pose_keeps_last_value() {
        let mut measure = SitReachMeasure::new(0.3);
        let scale = PxPerCm::new(10.0);

        let pose = pose_with(&[
            (KeypointIndex::LeftWrist, 100.0, 300.0),
            (KeypointIndex::LeftAnkle, 200.0, 300.0),
        ]);
        measure.update(&input(&pose), scale);

        let empty = Pose::default();
        measure.update(&input(&empty), scale);
        assert_eq!(measure.reading(), Reading::Value(10.0));
    }

    #[test]
    fn test_without_scale_reports_uncalibrated() {
        let mut measure = SitReachMeasure::new(0.3);
        let pose = pose_with(&[
            (KeypointIndex::LeftWrist, 100.0, 300.0),
            (KeypointIndex::LeftAnkle, 200.0, 300.0),
        ]);
        measure.update(&input(&pose), None);
        assert_eq!(measure.reading(), Reading::Uncalibrated);
    }
}
