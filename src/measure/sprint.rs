use std::time::Duration;

use crate::calibration::PxPerCm;
use crate::config::MeasureConfig;
use crate::geometry::round2;

use super::{FrameInput, Reading, TestMeasure};

/// 30m走
///
/// フレーム幅に対する比率で置いたスタート・ゴールの2本の仮想線を
/// 人物BBox中心xが通過した時刻の差をタイムとする。
/// コースは画面左から右へ走る据え付けを前提とする。
pub struct SprintMeasure {
    start_frac: f32,
    finish_frac: f32,
    start_at: Option<Duration>,
    finish_at: Option<Duration>,
}

impl SprintMeasure {
    pub fn new(config: &MeasureConfig) -> Self {
        Self {
            start_frac: config.sprint_start_frac,
            finish_frac: config.sprint_finish_frac,
            start_at: None,
            finish_at: None,
        }
    }
}

impl TestMeasure for SprintMeasure {
    fn update(&mut self, input: &FrameInput, _scale: Option<PxPerCm>) {
        if self.finish_at.is_some() {
            return;
        }
        let Some(person) = input.persons.first() else {
            return;
        };
        let cx = person.bbox.center_x();
        let width = input.width as f32;

        if self.start_at.is_none() {
            if cx >= width * self.start_frac {
                self.start_at = Some(input.elapsed);
            }
            return;
        }
        if cx >= width * self.finish_frac {
            self.finish_at = Some(input.elapsed);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{BBox, Detection};

    fn feed(measure: &mut SprintMeasure, cx: f32, secs: f32) {
        let persons = [Detection::person(
            0.9,
            BBox {
                x: cx - 30.0,
                y: 100.0,
                width: 60.0,
                height: 300.0,
            },
        )];
        let input = FrameInput {
            elapsed: Duration::from_secs_f32(secs),
            width: 1000,
            height: 720,
            persons: &persons,
            pose: None,
            pixels: None,
        };
        measure.update(&input, None);
    }

    #[test]
    fn test_time_between_lines() {
        let mut measure = SprintMeasure::new(&MeasureConfig::default());
        // スタート線200px・ゴール線800px
        feed(&mut measure, 100.0, 0.0);
        assert_eq!(measure.reading(), Reading::Pending);
        feed(&mut measure, 250.0, 1.0);
        feed(&mut measure, 500.0, 3.0);
        assert!(!measure.finished());
        feed(&mut measure, 850.0, 5.5);
        assert!(measure.finished());
        assert_eq!(measure.reading(), Reading::Value(4.5));
    }

    #[test]
    fn test_finish_time_does_not_drift_after_goal() {
        let mut measure = SprintMeasure::new(&MeasureConfig::default());
        feed(&mut measure, 250.0, 1.0);
        feed(&mut measure, 850.0, 5.0);
        feed(&mut measure, 900.0, 7.0);
        assert_eq!(measure.reading(), Reading::Value(4.0));
    }

    #[test]
    fn test_no_person_frames_are_ignored() {
        let mut measure = SprintMeasure::new(&MeasureConfig::default());
        let input = FrameInput {
            elapsed: Duration::from_secs(1),
            width: 1000,
            height: 720,
            persons: &[],
            pose: None,
            pixels: None,
        };
        measure.update(&input, None);
        assert_eq!(measure.reading(), Reading::Pending);
    }
}
