use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{Mat, Size, CV_32FC3},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::frame::RgbFrame;
use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// MoveNetが出力するキーポイント数（つま先は含まない）
const MOVENET_KEYPOINTS: usize = 17;

/// MoveNet SinglePose Lightning による姿勢推定器
pub struct PoseEstimator {
    session: Session,
    input_size: i32,
}

impl PoseEstimator {
    /// ONNXモデルを読み込んで初期化
    pub fn new(model_path: &str, input_size: i32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .context("Failed to load pose estimation ONNX model")?;
        Ok(Self {
            session,
            input_size,
        })
    }

    /// フレーム全体から主要人物の姿勢を推定（フレームピクセル座標）
    pub fn estimate(&mut self, frame: &RgbFrame) -> Result<Pose> {
        let input = self.preprocess(frame)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Pose estimation inference failed")?;

        // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)、座標は正規化済み
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract pose output tensor")?;

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for i in 0..MOVENET_KEYPOINTS {
            let y = output[[0, 0, i, 0]] * frame.height as f32;
            let x = output[[0, 0, i, 1]] * frame.width as f32;
            let confidence = output[[0, 0, i, 2]];
            keypoints[i] = Keypoint::new(x, y, confidence);
        }
        // つま先(17,18)はこのモデルでは取れない。confidence 0のまま残し、
        // 利用側が足首フォールバックで処理する。

        Ok(Pose::new(keypoints))
    }

    /// RGBフレーム → NHWC [1, input_size, input_size, 3] テンソルに変換
    fn preprocess(&self, frame: &RgbFrame) -> Result<Array4<f32>> {
        let size = self.input_size;
        let mat = frame.to_bgr_mat()?;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(size, size),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut float_mat = Mat::default();
        resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

        let s = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, s, s, 3));
        let data = float_mat.data_bytes()?;
        let step = float_mat.mat_step().get(0);
        for y in 0..s {
            let row_ptr = unsafe {
                std::slice::from_raw_parts(data.as_ptr().add(y * step) as *const f32, s * 3)
            };
            for x in 0..s {
                for c in 0..3 {
                    tensor[[0, y, x, c]] = row_ptr[x * 3 + c];
                }
            }
        }

        Ok(tensor)
    }
}
