use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;

use super::{FrameInput, Reading, TestMeasure};

/// 身長測定
///
/// 最も背の高い人物BBoxの高さをスケールでcmに換算し、整数に丸める。
/// 妥当範囲外の値は棄却して直前の値を保持する。
pub struct HeightMeasure {
    min_cm: f32,
    max_cm: f32,
    allow_uncalibrated: bool,
    last: Reading,
}

/// スケール無しの劣化モードで使う仮定値。
/// フレーム高さの8割に人物が写り、平均身長170cmとみなす近似。
const UNCALIBRATED_FILL_RATIO: f32 = 0.8;
const UNCALIBRATED_REFERENCE_CM: f32 = 170.0;

impl HeightMeasure {
    pub fn new(config: &MeasureConfig) -> Self {
        Self {
            min_cm: config.height_min_cm,
            max_cm: config.height_max_cm,
            allow_uncalibrated: config.allow_uncalibrated_height,
            last: Reading::Pending,
        }
    }

    fn accept(&mut self, cm: f32) {
        let rounded = cm.round();
        if rounded >= self.min_cm && rounded <= self.max_cm {
            self.last = Reading::Value(rounded as f64);
        }
    }
}

impl TestMeasure for HeightMeasure {
    fn update(&mut self, input: &FrameInput, scale: Option<PxPerCm>) {
        let Some(tallest) = input
            .persons
            .iter()
            .map(|d| d.bbox.height)
            .fold(None::<f32>, |acc, h| {
                Some(acc.map_or(h, |a| a.max(h)))
            })
        else {
            return;
        };

        match scale {
            Some(scale) => self.accept(scale.to_cm(tallest)),
            None if self.allow_uncalibrated => {
                let ratio = tallest / input.height as f32;
                self.accept(ratio / UNCALIBRATED_FILL_RATIO * UNCALIBRATED_REFERENCE_CM);
            }
            None => {
                if self.last == Reading::Pending {
                    self.last = Reading::Uncalibrated;
                }
            }
        }
    }

    fn reading(&self) -> Reading {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{BBox, Detection};
    use std::time::Duration;

    fn input_with_persons(persons: &[Detection]) -> FrameInput {
        FrameInput {
            elapsed: Duration::ZERO,
            width: 1280,
            height: 720,
            persons,
            pose: None,
            pixels: None,
        }
    }

    fn person_of_height(h: f32) -> Detection {
        Detection::person(
            0.9,
            BBox {
                x: 100.0,
                y: 50.0,
                width: 60.0,
                height: h,
            },
        )
    }

    #[test]
    fn test_height_from_tallest_bbox() {
        let config = MeasureConfig::default();
        let mut measure = HeightMeasure::new(&config);
        let scale = PxPerCm::new(4.0);

        let persons = [person_of_height(480.0), person_of_height(648.0)];
        measure.update(&input_with_persons(&persons), scale);
        // 648px / 4.0 = 162cm
        assert_eq!(measure.reading(), Reading::Value(162.0));
    }

    #[test]
    fn test_implausible_height_is_rejected() {
        let config = MeasureConfig::default();
        let mut measure = HeightMeasure::new(&config);
        let scale = PxPerCm::new(4.0);

        let good = [person_of_height(648.0)];
        measure.update(&input_with_persons(&good), scale);
        // 40px → 10cm は範囲外。直前の値を保持
        let bad = [person_of_height(40.0)];
        measure.update(&input_with_persons(&bad), scale);
        assert_eq!(measure.reading(), Reading::Value(162.0));
    }

    #[test]
    fn test_uncalibrated_reports_needed() {
        let config = MeasureConfig::default();
        let mut measure = HeightMeasure::new(&config);
        let persons = [person_of_height(648.0)];
        measure.update(&input_with_persons(&persons), None);
        assert_eq!(measure.reading(), Reading::Uncalibrated);
    }

    #[test]
    fn test_uncalibrated_heuristic_when_enabled() {
        let config = MeasureConfig {
            allow_uncalibrated_height: true,
            ..MeasureConfig::default()
        };
        let mut measure = HeightMeasure::new(&config);
        // 576px / 720px / 0.8 * 170 = 170cm
        let persons = [person_of_height(576.0)];
        measure.update(&input_with_persons(&persons), None);
        assert_eq!(measure.reading(), Reading::Value(170.0));
    }

    #[test]
    fn test_no_person_keeps_pending() {
        let config = MeasureConfig::default();
        let mut measure = HeightMeasure::new(&config);
        measure.update(&input_with_persons(&[]), PxPerCm::new(4.0));
        assert_eq!(measure.reading(), Reading::Pending);
    }
}
