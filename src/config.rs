use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub measure: MeasureConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PerceptionConfig {
    /// 人物検出モデル (YOLOv8n ONNX)
    #[serde(default = "default_detector_model")]
    pub detector_model: String,
    /// 検出モデルの入力解像度
    #[serde(default = "default_detector_input_size")]
    pub detector_input_size: i32,
    /// 姿勢推定モデル (MoveNet SinglePose Lightning ONNX)
    #[serde(default = "default_pose_model")]
    pub pose_model: String,
    /// 姿勢推定モデルの入力解像度
    #[serde(default = "default_pose_input_size")]
    pub pose_input_size: i32,
    /// 人物検出の信頼度閾値
    #[serde(default = "default_person_score_threshold")]
    pub person_score_threshold: f32,
    /// キーポイントの信頼度閾値
    #[serde(default = "default_keypoint_score_threshold")]
    pub keypoint_score_threshold: f32,
    /// NMSのIoU閾値
    #[serde(default = "default_nms_iou_threshold")]
    pub nms_iou_threshold: f32,
}

fn default_detector_model() -> String { "models/yolov8n.onnx".to_string() }
fn default_detector_input_size() -> i32 { 640 }
fn default_pose_model() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_pose_input_size() -> i32 { 192 }
fn default_person_score_threshold() -> f32 { 0.5 }
fn default_keypoint_score_threshold() -> f32 { 0.3 }
fn default_nms_iou_threshold() -> f32 { 0.45 }

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            detector_model: default_detector_model(),
            detector_input_size: default_detector_input_size(),
            pose_model: default_pose_model(),
            pose_input_size: default_pose_input_size(),
            person_score_threshold: default_person_score_threshold(),
            keypoint_score_threshold: default_keypoint_score_threshold(),
            nms_iou_threshold: default_nms_iou_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// スケール保存先パス
    #[serde(default = "default_scale_path")]
    pub scale_path: String,
    /// Canny下限閾値
    #[serde(default = "default_canny_low")]
    pub canny_low: f64,
    /// Canny上限閾値
    #[serde(default = "default_canny_high")]
    pub canny_high: f64,
    /// 多角形近似の許容誤差（周長比）
    #[serde(default = "default_approx_epsilon_ratio")]
    pub approx_epsilon_ratio: f64,
    /// A4アスペクト比の許容下限
    #[serde(default = "default_min_aspect")]
    pub min_aspect: f32,
    /// A4アスペクト比の許容上限
    #[serde(default = "default_max_aspect")]
    pub max_aspect: f32,
}

fn default_scale_path() -> String { "calibration.json".to_string() }
fn default_canny_low() -> f64 { 50.0 }
fn default_canny_high() -> f64 { 150.0 }
fn default_approx_epsilon_ratio() -> f64 { 0.02 }
fn default_min_aspect() -> f32 { 1.3 }
fn default_max_aspect() -> f32 { 1.5 }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            scale_path: default_scale_path(),
            canny_low: default_canny_low(),
            canny_high: default_canny_high(),
            approx_epsilon_ratio: default_approx_epsilon_ratio(),
            min_aspect: default_min_aspect(),
            max_aspect: default_max_aspect(),
        }
    }
}

/// 種目ごとの測定パラメータ
///
/// スプリント・シャトルのライン位置などはカメラの据え付け前提に依存するため、
/// ドメイン不変量ではなく設定値として扱う。
#[derive(Debug, Deserialize, Clone)]
pub struct MeasureConfig {
    /// ジャンプ系の基準位置キャプチャフレーム数（録画開始直後）
    #[serde(default = "default_baseline_frames")]
    pub baseline_frames: u32,
    /// 基準位置EMAの新値重み
    #[serde(default = "default_baseline_alpha")]
    pub baseline_alpha: f32,
    /// 30m走スタートライン（フレーム幅比）
    #[serde(default = "default_sprint_start_frac")]
    pub sprint_start_frac: f32,
    /// 30m走ゴールライン（フレーム幅比）
    #[serde(default = "default_sprint_finish_frac")]
    pub sprint_finish_frac: f32,
    /// シャトルラン左ライン（フレーム幅比）
    #[serde(default = "default_shuttle_left_frac")]
    pub shuttle_left_frac: f32,
    /// シャトルラン右ライン（フレーム幅比）
    #[serde(default = "default_shuttle_right_frac")]
    pub shuttle_right_frac: f32,
    /// シャトルラン終了までの横断回数
    #[serde(default = "default_shuttle_crossings")]
    pub shuttle_crossings: u32,
    /// 上体起こし: クランチ判定角度（度）
    #[serde(default = "default_crunch_angle_deg")]
    pub crunch_angle_deg: f32,
    /// 上体起こし: 伸展判定角度（度）
    #[serde(default = "default_extend_angle_deg")]
    pub extend_angle_deg: f32,
    /// ボール投げ: 動体判定のチャンネル差分合計閾値
    #[serde(default = "default_motion_diff_threshold")]
    pub motion_diff_threshold: u32,
    /// ボール投げ: 重心計算に必要な動体ピクセル数
    #[serde(default = "default_motion_min_pixels")]
    pub motion_min_pixels: usize,
    /// 身長の妥当範囲下限（cm）
    #[serde(default = "default_height_min_cm")]
    pub height_min_cm: f32,
    /// 身長の妥当範囲上限（cm）
    #[serde(default = "default_height_max_cm")]
    pub height_max_cm: f32,
    /// キャリブレーション無しでの身長推定（劣化モード）を許可するか
    ///
    /// フレーム高さ比からの推定は近似にすぎないため既定では無効。
    #[serde(default)]
    pub allow_uncalibrated_height: bool,
}

fn default_baseline_frames() -> u32 { 30 }
fn default_baseline_alpha() -> f32 { 0.1 }
fn default_sprint_start_frac() -> f32 { 0.2 }
fn default_sprint_finish_frac() -> f32 { 0.8 }
fn default_shuttle_left_frac() -> f32 { 0.3 }
fn default_shuttle_right_frac() -> f32 { 0.7 }
fn default_shuttle_crossings() -> u32 { 8 }
fn default_crunch_angle_deg() -> f32 { 60.0 }
fn default_extend_angle_deg() -> f32 { 120.0 }
fn default_motion_diff_threshold() -> u32 { 60 }
fn default_motion_min_pixels() -> usize { 200 }
fn default_height_min_cm() -> f32 { 50.0 }
fn default_height_max_cm() -> f32 { 250.0 }

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            baseline_frames: default_baseline_frames(),
            baseline_alpha: default_baseline_alpha(),
            sprint_start_frac: default_sprint_start_frac(),
            sprint_finish_frac: default_sprint_finish_frac(),
            shuttle_left_frac: default_shuttle_left_frac(),
            shuttle_right_frac: default_shuttle_right_frac(),
            shuttle_crossings: default_shuttle_crossings(),
            crunch_angle_deg: default_crunch_angle_deg(),
            extend_angle_deg: default_extend_angle_deg(),
            motion_diff_threshold: default_motion_diff_threshold(),
            motion_min_pixels: default_motion_min_pixels(),
            height_min_cm: default_height_min_cm(),
            height_max_cm: default_height_max_cm(),
            allow_uncalibrated_height: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// 近距離種目用（前面）カメラのデバイス番号
    #[serde(default)]
    pub front_camera_index: i32,
    /// 距離系種目用（背面）カメラのデバイス番号
    #[serde(default = "default_rear_camera_index")]
    pub rear_camera_index: i32,
    /// カメラ解像度（未指定ならデバイス既定）
    #[serde(default)]
    pub camera_width: Option<u32>,
    #[serde(default)]
    pub camera_height: Option<u32>,
    /// 録画ファイルの出力先ディレクトリ
    #[serde(default = "default_record_dir")]
    pub record_dir: String,
    /// 録画FPS
    #[serde(default = "default_record_fps")]
    pub record_fps: f64,
    /// 休憩を挟む種目（この種目の完了後に休憩画面へ）
    #[serde(default = "default_break_after")]
    pub break_after: String,
    /// 休憩時間（秒）
    #[serde(default = "default_break_secs")]
    pub break_secs: u64,
}

fn default_rear_camera_index() -> i32 { 1 }
fn default_record_dir() -> String { "recordings".to_string() }
fn default_record_fps() -> f64 { 30.0 }
fn default_break_after() -> String { "sit_and_reach".to_string() }
fn default_break_secs() -> u64 { 300 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            front_camera_index: 0,
            rear_camera_index: default_rear_camera_index(),
            camera_width: None,
            camera_height: None,
            record_dir: default_record_dir(),
            record_fps: default_record_fps(),
            break_after: default_break_after(),
            break_secs: default_break_secs(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが無い・壊れている場合は既定値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("設定ファイルを読めないため既定値を使用します: {}", e);
                Self::default()
            }
        }
    }
}
