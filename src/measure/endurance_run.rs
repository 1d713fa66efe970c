use std::time::Duration;

use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round2;

use super::{FrameInput, Reading, TestMeasure};

/// 持久走（800m〜1.6km）
///
/// 周回コースの計測地点をフレーム中央線とみなし、最初の通過で計時開始、
/// 以降の左右入れ替わりを1周として数える。タイムは最後に数えた周回の
/// 経過秒。終了判定は持たず、停止は係員の操作に委ねる。
pub struct EnduranceRunMeasure {
    start_at: Option<Duration>,
    prev_left: Option<bool>,
    laps: u32,
    last_lap_secs: Option<f32>,
}

impl EnduranceRunMeasure {
    pub fn new(_config: &MeasureConfig) -> Self {
        Self {
            start_at: None,
            prev_left: None,
            laps: 0,
            last_lap_secs: None,
        }
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }
}

impl TestMeasure for EnduranceRunMeasure {
    fn update(&mut self, input: &FrameInput, _scale: Option<PxPerCm>) {
        let Some(person) = input.persons.first() else {
            return;
        };
        let left = person.bbox.center_x() < input.width as f32 / 2.0;

        match self.prev_left {
            None => {
                self.prev_left = Some(left);
            }
            Some(prev) if prev != left => {
                self.prev_left = Some(left);
                match self.start_at {
                    None => self.start_at = Some(input.elapsed),
                    Some(start) => {
                        self.laps += 1;
                        let secs = input.elapsed.saturating_sub(start).as_secs_f32();
                        self.last_lap_secs = Some(secs);
                    }
                }
            }
            Some(_) => {}
        }
    }

    fn reading(&self) -> Reading {
        match self.last_lap_secs {
            Some(secs) => Reading::Value(round2(secs) as f64),
            None => Reading::Pending,
        }
    }
}
