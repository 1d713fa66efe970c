//! A4用紙を基準物としたピクセル/センチ スケールのキャリブレーション
//!
//! ユーザー操作で起動する一回限りの処理。フレーム内から4頂点の輪郭を探し、
//! A4のアスペクト比（210mm x 297mm ≈ 1.41）に合う最大の候補から
//! `pixels / 29.7` でスケールを求める。

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A4縦の実寸（cm）
pub const A4_HEIGHT_CM: f32 = 29.7;

/// ピクセル/センチ換算スケール
///
/// 不変量: 値は常に正。これが無いセッションでは実寸系の測定値は
/// 「要キャリブレーション」として扱い、数値を出してはならない。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PxPerCm(f32);

impl PxPerCm {
    pub fn new(value: f32) -> Option<Self> {
        if value.is_finite() && value > 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// ピクセル距離 → センチ
    pub fn to_cm(self, pixels: f32) -> f32 {
        pixels / self.0
    }

    /// センチ → ピクセル距離
    pub fn to_px(self, cm: f32) -> f32 {
        cm * self.0
    }
}

/// 輪郭近似で得た4頂点候補のバウンディングボックス寸法
#[derive(Debug, Clone, Copy)]
pub struct QuadCandidate {
    pub width: f32,
    pub height: f32,
}

impl QuadCandidate {
    /// max(w/h, h/w)。向きに依らないアスペクト比
    pub fn aspect(&self) -> f32 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return 0.0;
        }
        let r = self.width / self.height;
        r.max(1.0 / r)
    }
}

/// アスペクト比が (min_aspect, max_aspect) に収まる候補のうち、
/// 最も背の高いもののピクセル高さを返す
pub fn select_a4_quad(
    candidates: &[QuadCandidate],
    min_aspect: f32,
    max_aspect: f32,
) -> Option<f32> {
    let mut best_height: Option<f32> = None;
    for cand in candidates {
        let aspect = cand.aspect();
        if aspect > min_aspect && aspect < max_aspect {
            match best_height {
                Some(h) if cand.height <= h => {}
                _ => best_height = Some(cand.height),
            }
        }
    }
    best_height
}

/// A4縦のピクセル高さからスケールを算出
pub fn scale_from_quad_height(pixel_height: f32) -> Option<PxPerCm> {
    PxPerCm::new(pixel_height / A4_HEIGHT_CM)
}

// --- Save / Load ---

/// セッションをまたいで再利用するための保存形式
///
/// スケールは自動失効しないため、いつ・どの解像度で取ったかを
/// 併記して運用側が古さを判断できるようにする。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredScale {
    pub px_per_cm: f32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// 取得時刻（UNIX秒）
    pub captured_at: u64,
}

impl StoredScale {
    pub fn new(scale: PxPerCm, frame_width: u32, frame_height: u32) -> Self {
        let captured_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            px_per_cm: scale.value(),
            frame_width,
            frame_height,
            captured_at,
        }
    }

    pub fn scale(&self) -> Option<PxPerCm> {
        PxPerCm::new(self.px_per_cm)
    }
}

pub fn save_scale<P: AsRef<Path>>(path: P, stored: &StoredScale) -> Result<()> {
    let json = serde_json::to_string_pretty(stored)?;
    fs::write(path, json).context("Failed to write calibration file")?;
    Ok(())
}

pub fn load_scale<P: AsRef<Path>>(path: P) -> Result<StoredScale> {
    let content = fs::read_to_string(path).context("Failed to read calibration file")?;
    let stored: StoredScale = serde_json::from_str(&content)?;
    Ok(stored)
}

// --- OpenCVによる輪郭検出（デスクトップのみ） ---

#[cfg(feature = "desktop")]
mod detect {
    use super::*;
    use crate::config::CalibrationConfig;
    use crate::perception::RgbFrame;
    use opencv::{
        core::{Mat, Size, Vector},
        imgproc,
        prelude::*,
    };

    /// 現在フレームからA4用紙を探してスケールを求める
    ///
    /// 失敗してもエラーを返すだけで、呼び出し側が保持している
    /// 既存のスケールには触れない。
    pub fn detect_a4_scale(frame: &RgbFrame, config: &CalibrationConfig) -> Result<PxPerCm> {
        let mat = frame.to_bgr_mat()?;

        let mut gray = Mat::default();
        imgproc::cvt_color_def(&mat, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(&gray, &mut blurred, Size::new(5, 5), 0.0)?;

        let mut edges = Mat::default();
        imgproc::canny_def(&blurred, &mut edges, config.canny_low, config.canny_high)?;

        let mut contours = Vector::<Vector<opencv::core::Point>>::new();
        imgproc::find_contours_def(
            &edges,
            &mut contours,
            imgproc::RETR_LIST,
            imgproc::CHAIN_APPROX_SIMPLE,
        )?;

        let mut candidates = Vec::new();
        for contour in contours.iter() {
            let peri = imgproc::arc_length(&contour, true)?;
            let mut approx = Vector::<opencv::core::Point>::new();
            imgproc::approx_poly_dp(
                &contour,
                &mut approx,
                config.approx_epsilon_ratio * peri,
                true,
            )?;
            if approx.len() == 4 {
                let rect = imgproc::bounding_rect(&approx)?;
                candidates.push(QuadCandidate {
                    width: rect.width as f32,
                    height: rect.height as f32,
                });
            }
        }

        let Some(pixel_height) =
            select_a4_quad(&candidates, config.min_aspect, config.max_aspect)
        else {
            bail!("キャリブレーション失敗: A4用紙全体がフレームに映っているか確認してください");
        };

        scale_from_quad_height(pixel_height)
            .context("Calibration produced a non-positive scale")
    }
}

#[cfg(feature = "desktop")]
pub use detect::detect_a4_scale;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rejects_non_positive() {
        assert!(PxPerCm::new(0.0).is_none());
        assert!(PxPerCm::new(-3.0).is_none());
        assert!(PxPerCm::new(f32::NAN).is_none());
        assert!(PxPerCm::new(4.2).is_some());
    }

    #[test]
    fn test_scale_from_known_height() {
        // 高さ297px・比率1.414の合成候補 → scale = 297 / 29.7 = 10 px/cm
        let scale = scale_from_quad_height(297.0).unwrap();
        assert!((scale.value() - 10.0).abs() < 1e-5, "scale={}", scale.value());
    }

    #[test]
    fn test_select_accepts_a4_aspect_band() {
        let candidates = [QuadCandidate { width: 210.0, height: 297.0 }];
        let h = select_a4_quad(&candidates, 1.3, 1.5);
        assert_eq!(h, Some(297.0));
    }

    #[test]
    fn test_select_rejects_out_of_band_aspect() {
        // 正方形（比率1.0）と細長い長方形（比率2.0）は候補にならない
        let candidates = [
            QuadCandidate { width: 100.0, height: 100.0 },
            QuadCandidate { width: 100.0, height: 200.0 },
        ];
        assert_eq!(select_a4_quad(&candidates, 1.3, 1.5), None);
    }

    #[test]
    fn test_select_prefers_tallest() {
        let candidates = [
            QuadCandidate { width: 105.0, height: 148.0 },
            QuadCandidate { width: 210.0, height: 297.0 },
            QuadCandidate { width: 70.0, height: 99.0 },
        ];
        assert_eq!(select_a4_quad(&candidates, 1.3, 1.5), Some(297.0));
    }

    #[test]
    fn test_select_landscape_orientation_accepted() {
        // 横向きのA4でも max(w/h, h/w) で判定する
        let candidates = [QuadCandidate { width: 297.0, height: 210.0 }];
        assert_eq!(select_a4_quad(&candidates, 1.3, 1.5), Some(210.0));
    }

    #[test]
    fn test_px_cm_round_trip() {
        let scale = PxPerCm::new(7.3).unwrap();
        for &px in &[1.0f32, 12.5, 333.0, 1999.75] {
            let cm = scale.to_cm(px);
            let back = scale.to_px(cm);
            assert!((back - px).abs() < 1e-3, "px={} back={}", px, back);
        }
    }

    #[test]
    fn test_stored_scale_round_trip() {
        let scale = PxPerCm::new(10.0).unwrap();
        let stored = StoredScale::new(scale, 1280, 720);
        let json = serde_json::to_string(&stored).unwrap();
        let parsed: StoredScale = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.px_per_cm, 10.0);
        assert_eq!(parsed.frame_width, 1280);
        assert_eq!(parsed.scale().unwrap().value(), 10.0);
    }
}
