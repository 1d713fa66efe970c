use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::angle_at_deg;
use crate::perception::KeypointIndex;

use super::{FrameInput, Reading, TestMeasure};

/// 上体起こし
///
/// 肩-腰-膝の角度で起き上がりを判定する。クランチ（< 60度）を
/// ラッチし、その後の伸展（> 120度）で1回と数えるヒステリシス。
/// 中間角度での震えは回数に影響しない。
pub struct SitUpsMeasure {
    crunch_angle: f32,
    extend_angle: f32,
    keypoint_threshold: f32,
    crunched: bool,
    count: u32,
}

impl SitUpsMeasure {
    pub fn new(config: &MeasureConfig, keypoint_threshold: f32) -> Self {
        Self {
            crunch_angle: config.crunch_angle_deg,
            extend_angle: config.extend_angle_deg,
            keypoint_threshold,
            crunched: false,
            count: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    fn torso_angle(&self, input: &FrameInput) -> Option<f32> {
        let pose = input.pose?;
        let thr = self.keypoint_threshold;
        let shoulder =
            pose.bilateral((KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder), thr)?;
        let hip = pose.bilateral((KeypointIndex::LeftHip, KeypointIndex::RightHip), thr)?;
        let knee = pose.bilateral((KeypointIndex::LeftKnee, KeypointIndex::RightKnee), thr)?;
        Some(angle_at_deg(shoulder, hip, knee))
    }
}

impl TestMeasure for SitUpsMeasure {
    fn update(&mut self, input: &FrameInput, _scale: Option<PxPerCm>) {
        let Some(angle) = self.torso_angle(input) else {
            return;
        };

        if angle < self.crunch_angle {
            self.crunched = true;
        } else if angle > self.extend_angle && self.crunched {
            self.crunched = false;
            self.count += 1;
        }
    }

    fn reading(&self) -> Reading {
        Reading::Value(self.count as f64)
    }
}
