use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round2;

use super::{FrameInput, Reading, TestMeasure};

/// ボール投げ
///
/// ボールはモデルで追えないため、前フレームとのピクセル差分で
/// 動体の重心を追う。最初に検出した重心を投てき位置とみなし、
/// そこからの最大水平移動量を距離とする。
pub struct BallThrowMeasure {
    diff_threshold: u32,
    min_pixels: usize,
    prev: Option<crate::perception::RgbFrame>,
    start_x: Option<f32>,
    max_dx: f32,
    last: Reading,
}

impl BallThrowMeasure {
    pub fn new(config: &MeasureConfig) -> Self {
        Self {
            diff_threshold: config.motion_diff_threshold,
            min_pixels: config.motion_min_pixels,
            prev: None,
            start_x: None,
            max_dx: 0.0,
            last: Reading::Pending,
        }
    }

    /// 前フレームとの差分から動体重心のxを求める
    fn motion_centroid_x(&self, frame: &crate::perception::RgbFrame) -> Option<f32> {
        let prev = self.prev.as_ref()?;
        if prev.width != frame.width || prev.height != frame.height {
            return None;
        }

        let mut count: usize = 0;
        let mut sum_x: f64 = 0.0;
        let width = frame.width as usize;
        for (i, (cur, old)) in frame
            .data
            .chunks_exact(3)
            .zip(prev.data.chunks_exact(3))
            .enumerate()
        {
            let diff = cur[0].abs_diff(old[0]) as u32
                + cur[1].abs_diff(old[1]) as u32
                + cur[2].abs_diff(old[2]) as u32;
            if diff > self.diff_threshold {
                count += 1;
                sum_x += (i % width) as f64;
            }
        }

        // ノイズ程度の差分では重心を出さない
        if count > self.min_pixels {
            Some((sum_x / count as f64) as f32)
        } else {
            None
        }
    }
}

impl TestMeasure for BallThrowMeasure {
    fn on_recording_start(&mut self) {
        self.prev = None;
        self.start_x = None;
        self.max_dx = 0.0;
        self.last = Reading::Pending;
    }

    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>) {
        let Some(frame) = input.pixels else {
            return;
        };

        if let Some(cx) = self.motion_centroid_x(frame) {
            match self.start_x {
                None => self.start_x = Some(cx),
                Some(start) => {
                    let dx = (cx - start).abs();
                    if dx > self.max_dx {
                        self.max_dx = dx;
                    }
                }
            }
        }
        self.prev = Some(frame.clone());

        if self.max_dx > 0.0 {
            match scale {
                Some(scale) => {
                    let meters = scale.to_cm(self.max_dx) / 100.0;
                    self.last = Reading::Value(round2(meters) as f64);
                }
                None => self.last = Reading::Uncalibrated,
            }
        }
    }

    fn reading(&self) -> Reading {
        self.last
    }
}
