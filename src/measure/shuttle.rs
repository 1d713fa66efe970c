use std::time::Duration;

use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round2;

use super::{FrameInput, Reading, TestMeasure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// 4×10mシャトルラン
///
/// 左右2本の折り返し線のどちらかを最初に越えた時点で計時開始
/// （1回目の横断として数える）。以降は中央線に対する左右の入れ替わりを
/// 横断として数え、規定回数に達した時刻までをタイムとする。
pub struct ShuttleRunMeasure {
    left_frac: f32,
    right_frac: f32,
    target_crossings: u32,
    start_at: Option<Duration>,
    finish_at: Option<Duration>,
    prev_side: Option<Side>,
    crossings: u32,
}

impl ShuttleRunMeasure {
    pub fn new(config: &MeasureConfig) -> Self {
        Self {
            left_frac: config.shuttle_left_frac,
            right_frac: config.shuttle_right_frac,
            target_crossings: config.shuttle_crossings,
            start_at: None,
            finish_at: None,
            prev_side: None,
            crossings: 0,
        }
    }

    pub fn crossings(&self) -> u32 {
        self.crossings
    }

    fn side_of(&self, cx: f32, width: f32) -> Side {
        if cx < width * (self.left_frac + self.right_frac) / 2.0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

impl TestMeasure for ShuttleRunMeasure {
    fn update(&mut self, input: &FrameInput, _scale: Option<PxPerCm>) {
        if self.finish_at.is_some() {
            return;
        }
        let Some(person) = input.persons.first() else {
            return;
        };
        let cx = person.bbox.center_x();
        let width = input.width as f32;
        let side = self.side_of(cx, width);

        if self.start_at.is_none() {
            // どちらかの折り返し線を越えるまでは待機中
            if cx <= width * self.left_frac || cx >= width * self.right_frac {
                self.start_at = Some(input.elapsed);
                self.crossings = 1;
                self.prev_side = Some(side);
            }
            return;
        }

        if self.prev_side != Some(side) {
            self.prev_side = Some(side);
            self.crossings += 1;
            if self.crossings >= self.target_crossings {
                self.finish_at = Some(input.elapsed);
            }
        }
    }

    fn reading(&self) -> Reading {
        match (self.start_at, self.finish_at) {
            (Some(start), Some(finish)) => {
                let secs = finish.saturating_sub(start).as_secs_f32();
                Reading::Value(round2(secs) as f64)
            }
            _ => Reading::Pending,
        }
    }

    fn finished(&self) -> bool {
        self.finish_at.is_some()
    }
}
