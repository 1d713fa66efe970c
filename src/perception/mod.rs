pub mod detect;
pub mod frame;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod person_detector;
#[cfg(feature = "desktop")]
pub mod pose_estimator;
#[cfg(feature = "desktop")]
pub mod stack;

pub use detect::{nms_persons, valid_persons, BBox, Detection};
pub use frame::RgbFrame;
pub use keypoint::{average_bilateral, Keypoint, KeypointIndex, Pose};
#[cfg(feature = "desktop")]
pub use person_detector::PersonDetector;
#[cfg(feature = "desktop")]
pub use pose_estimator::PoseEstimator;
#[cfg(feature = "desktop")]
pub use stack::PerceptionStack;

use anyhow::Result;

/// 種目ごとに必要な認識能力の段階
///
/// 人物検出だけで足りる種目（走行系・身長）ではポーズモデルを
/// ロードしない。ロードはティアが最初に要求された時点まで遅延する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CapabilityTier {
    /// 人物検出のみ
    Detector,
    /// 人物検出 + 姿勢推定
    DetectorAndPose,
}

/// フレーム単位の認識処理
///
/// セッション制御はこのトレイト越しにモデルを呼ぶ。テストでは
/// 合成の検出結果を返すフェイク実装を差し込む。
pub trait FramePerception {
    /// フレーム内の全人物検出を返す（閾値以上・NMS済み）
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>>;

    /// 主要人物の姿勢を推定する。人物がいなければNone
    fn estimate_pose(&mut self, frame: &RgbFrame) -> Result<Option<Pose>>;
}

// モデルを種目をまたいで使い回せるよう、可変参照でも実装を通す
impl<T: FramePerception + ?Sized> FramePerception for &mut T {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn estimate_pose(&mut self, frame: &RgbFrame) -> Result<Option<Pose>> {
        (**self).estimate_pose(frame)
    }
}
