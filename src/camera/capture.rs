use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};

use crate::config::SessionConfig;
use crate::measure::CameraFacing;
use crate::perception::RgbFrame;
use crate::session::CameraSource;

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// 種目のカメラ向きに対応するデバイスを開く
    pub fn open_for(facing: CameraFacing, config: &SessionConfig) -> Result<Self> {
        let index = match facing {
            CameraFacing::Front => config.front_camera_index,
            CameraFacing::Rear => config.rear_camera_index,
        };
        Self::open_with_resolution(index, config.camera_width, config.camera_height)
    }

    /// カメラを開く（デフォルトカメラ: index 0）
    pub fn open(index: i32) -> Result<Self> {
        Self::open_with_resolution(index, None, None)
    }

    /// 解像度を指定してカメラを開く
    pub fn open_with_resolution(
        index: i32,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Self> {
        let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        println!("カメラ{}を開きました: {}x{}", index, actual_width, actual_height);

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    /// フレームを読み込む（BGR形式）
    fn read_bgr(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        Ok(frame)
    }
}

impl CameraSource for OpenCvCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<RgbFrame> {
        let bgr = self.read_bgr()?;
        RgbFrame::from_bgr_mat(&bgr)
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            eprintln!("カメラ解放に失敗: {}", e);
        }
    }
}
