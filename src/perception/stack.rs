use anyhow::{Context, Result};

use super::detect::Detection;
use super::frame::RgbFrame;
use super::keypoint::Pose;
use super::person_detector::PersonDetector;
use super::pose_estimator::PoseEstimator;
use super::{CapabilityTier, FramePerception};
use crate::config::PerceptionConfig;

/// モデルを遅延ロードする認識スタック
///
/// 各モデルは対応するティアが最初に要求された時点でロードする。
/// 走行系の種目だけを実施するセッションではポーズモデルを
/// 一度もロードしない。
pub struct PerceptionStack {
    config: PerceptionConfig,
    detector: Option<PersonDetector>,
    pose: Option<PoseEstimator>,
}

impl PerceptionStack {
    pub fn new(config: PerceptionConfig) -> Self {
        Self {
            config,
            detector: None,
            pose: None,
        }
    }

    /// ティアに必要なモデルを事前ロードする
    ///
    /// 種目の録画開始前に呼んでおくと、最初のフレームで
    /// ロード時間のスパイクが乗らない。
    pub fn ensure_loaded(&mut self, tier: CapabilityTier) -> Result<()> {
        self.loaded_detector()?;
        if tier >= CapabilityTier::DetectorAndPose {
            self.loaded_pose()?;
        }
        Ok(())
    }

    fn loaded_detector(&mut self) -> Result<&mut PersonDetector> {
        if self.detector.is_none() {
            println!("人物検出モデルをロード: {}", self.config.detector_model);
            let detector = PersonDetector::new(
                &self.config.detector_model,
                self.config.detector_input_size,
                self.config.person_score_threshold,
                self.config.nms_iou_threshold,
            )?;
            return Ok(self.detector.insert(detector));
        }
        self.detector.as_mut().context("Detector not loaded")
    }

    fn loaded_pose(&mut self) -> Result<&mut PoseEstimator> {
        if self.pose.is_none() {
            println!("姿勢推定モデルをロード: {}", self.config.pose_model);
            let pose = PoseEstimator::new(&self.config.pose_model, self.config.pose_input_size)?;
            return Ok(self.pose.insert(pose));
        }
        self.pose.as_mut().context("Pose model not loaded")
    }
}

impl FramePerception for PerceptionStack {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>> {
        self.loaded_detector()?.detect(frame)
    }

    fn estimate_pose(&mut self, frame: &RgbFrame) -> Result<Option<Pose>> {
        // 人物がいないフレームで姿勢を出さない
        let persons = self.detect(frame)?;
        if persons.is_empty() {
            return Ok(None);
        }
        let pose = self.loaded_pose()?.estimate(frame)?;
        Ok(Some(pose))
    }
}
