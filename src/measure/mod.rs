//! 体力テスト10種目の測定ステートマシン
//!
//! 各種目は `TestMeasure` を実装し、配信されたフレームごとに
//! `update` を1回受ける。数値化できるまでは `Reading::Pending`、
//! スケール未取得で実寸が出せない間は `Reading::Uncalibrated` を返す。

pub mod ball_throw;
pub mod broad_jump;
pub mod endurance_run;
pub mod height;
pub mod manual;
pub mod shuttle;
pub mod sit_reach;
pub mod sit_ups;
pub mod sprint;
pub mod vertical_jump;

pub use manual::parse_manual_value;

use std::time::Duration;

use crate::calibration::PxPerCm;
use crate::config::{Config, SessionConfig};
use crate::perception::{CapabilityTier, Detection, Pose, RgbFrame};

/// 種目ID（実施順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestId {
    Height,
    Weight,
    SitAndReach,
    VerticalJump,
    BroadJump,
    BallThrow,
    Sprint,
    ShuttleRun,
    SitUps,
    EnduranceRun,
}

/// 結果の記録形態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// 手入力（数値のみ）
    Input,
    /// カメラ測定（録画または静止画つき）
    Video,
}

/// 種目が要求するカメラの向き
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Rear,
}

impl TestId {
    /// 全種目の実施順
    pub const ALL: [TestId; 10] = [
        TestId::Height,
        TestId::Weight,
        TestId::SitAndReach,
        TestId::VerticalJump,
        TestId::BroadJump,
        TestId::BallThrow,
        TestId::Sprint,
        TestId::ShuttleRun,
        TestId::SitUps,
        TestId::EnduranceRun,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TestId::Height => "身長",
            TestId::Weight => "体重",
            TestId::SitAndReach => "長座体前屈",
            TestId::VerticalJump => "垂直跳び",
            TestId::BroadJump => "立ち幅跳び",
            TestId::BallThrow => "ボール投げ",
            TestId::Sprint => "30m走",
            TestId::ShuttleRun => "4×10mシャトルラン",
            TestId::SitUps => "上体起こし",
            TestId::EnduranceRun => "持久走",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            TestId::Height => "cm",
            TestId::Weight => "kg",
            TestId::SitAndReach => "cm",
            TestId::VerticalJump => "cm",
            TestId::BroadJump => "cm",
            TestId::BallThrow => "m",
            TestId::Sprint => "秒",
            TestId::ShuttleRun => "秒",
            TestId::SitUps => "回",
            TestId::EnduranceRun => "秒",
        }
    }

    pub fn kind(&self) -> TestKind {
        match self {
            TestId::Weight => TestKind::Input,
            _ => TestKind::Video,
        }
    }

    /// 距離が必要な種目は引きで撮れる背面カメラを使う
    pub fn facing(&self) -> CameraFacing {
        match self {
            TestId::SitAndReach | TestId::VerticalJump | TestId::BroadJump => CameraFacing::Rear,
            _ => CameraFacing::Front,
        }
    }

    /// 種目に必要な認識ティア
    pub fn tier(&self) -> CapabilityTier {
        match self {
            TestId::SitAndReach | TestId::VerticalJump | TestId::BroadJump | TestId::SitUps => {
                CapabilityTier::DetectorAndPose
            }
            _ => CapabilityTier::Detector,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestId::Height => "height",
            TestId::Weight => "weight",
            TestId::SitAndReach => "sit_and_reach",
            TestId::VerticalJump => "vertical_jump",
            TestId::BroadJump => "broad_jump",
            TestId::BallThrow => "ball_throw",
            TestId::Sprint => "sprint_30m",
            TestId::ShuttleRun => "shuttle_run",
            TestId::SitUps => "sit_ups",
            TestId::EnduranceRun => "endurance_run",
        }
    }

    pub fn from_str(s: &str) -> Option<TestId> {
        TestId::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// 種目完了後の次のステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Test(TestId),
    /// 休憩を挟んでから次の種目へ
    Break { secs: u64, then: TestId },
    Done,
}

/// 現在の種目から次のステップを決める
pub fn next_step(current: TestId, config: &SessionConfig) -> NextStep {
    let pos = match TestId::ALL.iter().position(|t| *t == current) {
        Some(p) => p,
        None => return NextStep::Done,
    };
    let Some(next) = TestId::ALL.get(pos + 1).copied() else {
        return NextStep::Done;
    };
    if current.as_str() == config.break_after {
        NextStep::Break {
            secs: config.break_secs,
            then: next,
        }
    } else {
        NextStep::Test(next)
    }
}

/// 測定値の現在状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// まだ数値化できる観測が無い
    Pending,
    /// スケール未取得のため実寸を出せない
    Uncalibrated,
    Value(f64),
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// 1フレーム分の測定入力
///
/// persons はフィルタ済み（クラス・信頼度閾値・NMS適用後）。
/// pose / pixels は種目のティアに応じて省略される。
pub struct FrameInput<'a> {
    /// 録画開始からの経過時間
    pub elapsed: Duration,
    pub width: u32,
    pub height: u32,
    pub persons: &'a [Detection],
    pub pose: Option<&'a Pose>,
    pub pixels: Option<&'a RgbFrame>,
}

/// 種目測定ステートマシンの共通インタフェース
pub trait TestMeasure {
    /// 1フレーム分の観測を取り込む
    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>);

    /// 現在の測定値
    fn reading(&self) -> Reading;

    /// 終了条件を持つ種目が完了したか（録画停止のトリガ）
    fn finished(&self) -> bool {
        false
    }

    /// 録画開始の通知（基準位置キャプチャの起点）
    fn on_recording_start(&mut self) {}
}

/// 種目に対応する測定器を作る。手入力種目はNone
pub fn measure_for(test: TestId, config: &Config) -> Option<Box<dyn TestMeasure>> {
    let m = &config.measure;
    let kp_thr = config.perception.keypoint_score_threshold;
    match test {
        TestId::Height => Some(Box::new(height::HeightMeasure::new(m))),
        TestId::Weight => None,
        TestId::SitAndReach => Some(Box::new(sit_reach::SitReachMeasure::new(kp_thr))),
        TestId::VerticalJump => Some(Box::new(vertical_jump::VerticalJumpMeasure::new(m, kp_thr))),
        TestId::BroadJump => Some(Box::new(broad_jump::BroadJumpMeasure::new(m, kp_thr))),
        TestId::BallThrow => Some(Box::new(ball_throw::BallThrowMeasure::new(m))),
        TestId::Sprint => Some(Box::new(sprint::SprintMeasure::new(m))),
        TestId::ShuttleRun => Some(Box::new(shuttle::ShuttleRunMeasure::new(m))),
        TestId::SitUps => Some(Box::new(sit_ups::SitUpsMeasure::new(m, kp_thr))),
        TestId::EnduranceRun => Some(Box::new(endurance_run::EnduranceRunMeasure::new(m))),
    }
}
