use anyhow::{ensure, Result};

/// RGB24のフレームバッファ
///
/// カメラ・認識・録画・フレーム差分の間で受け渡す共通通貨。
/// data は行優先・パディング無しの width * height * 3 バイト。
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() == (width as usize) * (height as usize) * 3,
            "Frame buffer size {} does not match {}x{}x3",
            data.len(),
            width,
            height
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// 黒で初期化したフレーム
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 3],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = ((y * self.width + x) * 3) as usize;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) {
        let i = ((y * self.width + x) * 3) as usize;
        self.data[i] = rgb.0;
        self.data[i + 1] = rgb.1;
        self.data[i + 2] = rgb.2;
    }
}

#[cfg(feature = "desktop")]
mod cv {
    use super::*;
    use opencv::{core::Mat, imgproc, prelude::*};

    impl RgbFrame {
        /// BGRのカメラMatから変換
        pub fn from_bgr_mat(mat: &Mat) -> Result<Self> {
            let mut rgb = Mat::default();
            imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;
            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
            let step = rgb.mat_step().get(0);
            let bytes = rgb.data_bytes()?;
            // 行パディングを除去してコピー
            for y in 0..height as usize {
                let row = &bytes[y * step..y * step + (width as usize) * 3];
                data.extend_from_slice(row);
            }
            Self::new(width, height, data)
        }

        /// OpenCV処理用のBGR Matに変換
        pub fn to_bgr_mat(&self) -> Result<Mat> {
            let flat = Mat::new_rows_cols_with_data(
                self.height as i32,
                (self.width * 3) as i32,
                &self.data,
            )?;
            let rgb = flat.reshape(3, self.height as i32)?;
            let mut bgr = Mat::default();
            imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;
            Ok(bgr)
        }
    }
}
