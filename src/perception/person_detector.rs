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

use super::detect::{nms_persons, BBox, Detection};
use super::frame::RgbFrame;

/// YOLOv8nベースの人物検出器
///
/// フレーム内の全人物を返す。単独受検ルールの判定に使うため、
/// 最良の1件に絞らない。
pub struct PersonDetector {
    session: Session,
    input_size: i32,
    score_threshold: f32,
    nms_iou_threshold: f32,
}

impl PersonDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new(
        model_path: &str,
        input_size: i32,
        score_threshold: f32,
        nms_iou_threshold: f32,
    ) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .context("Failed to load person detection ONNX model")?;
        Ok(Self {
            session,
            input_size,
            score_threshold,
            nms_iou_threshold,
        })
    }

    /// フレーム内の全人物検出（閾値以上・NMS済み、フレーム座標）
    pub fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>> {
        let frame_w = frame.width as f32;
        let frame_h = frame.height as f32;
        let input = self.preprocess(frame)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["images" => input_tensor])
            .context("Person detection inference failed")?;

        // 出力: [1, 84, N]。行4がclass 0 (person) のスコア
        let output: ndarray::ArrayViewD<f32> = outputs["output0"]
            .try_extract_array()
            .context("Failed to extract person detection output")?;

        let scale_x = frame_w / self.input_size as f32;
        let scale_y = frame_h / self.input_size as f32;

        let n_detections = output.shape()[2];
        let mut detections = Vec::new();
        for i in 0..n_detections {
            let score = output[[0, 4, i]];
            if score <= self.score_threshold {
                continue;
            }
            // 座標変換: 入力サイズ基準の中心形式 → フレーム座標の左上形式
            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];
            detections.push(Detection::person(
                score,
                BBox {
                    x: (cx - w / 2.0) * scale_x,
                    y: (cy - h / 2.0) * scale_y,
                    width: w * scale_x,
                    height: h * scale_y,
                },
            ));
        }

        Ok(nms_persons(detections, self.nms_iou_threshold))
    }

    /// RGBフレーム → NCHW [1, 3, input_size, input_size] テンソルに変換
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

        // [0, 255] → [0.0, 1.0] 正規化 & NCHW変換
        let s = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
        let data = float_mat.data_bytes()?;
        let step = float_mat.mat_step().get(0);
        for y in 0..s {
            let row_ptr = unsafe {
                std::slice::from_raw_parts(data.as_ptr().add(y * step) as *const f32, s * 3)
            };
            for x in 0..s {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = row_ptr[x * 3 + c] / 255.0;
                }
            }
        }

        Ok(tensor)
    }
}
