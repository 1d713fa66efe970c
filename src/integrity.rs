//! 単独受検ルールの監視
//!
//! 録画中のフレームに2人以上が映った時点で違反が確定する。
//! ラッチは一方向で、以降のフレームで1人に戻っても解除されない。

use serde::Serialize;

use crate::perception::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    Ok { person_count: usize },
    Violated,
}

/// セッション1種目分の違反監視
#[derive(Debug, Default)]
pub struct IntegrityMonitor {
    max_person_count: usize,
    violated: bool,
}

impl IntegrityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// フィルタ済みの人物検出を1フレーム分観測する
    pub fn observe(&mut self, persons: &[Detection]) -> IntegrityStatus {
        let count = persons.len();
        if count > self.max_person_count {
            self.max_person_count = count;
        }
        if count > 1 {
            self.violated = true;
        }
        if self.violated {
            IntegrityStatus::Violated
        } else {
            IntegrityStatus::Ok {
                person_count: count,
            }
        }
    }

    pub fn is_violated(&self) -> bool {
        self.violated
    }

    pub fn report(&self) -> IntegrityReport {
        IntegrityReport {
            violated: self.violated,
            max_person_count: self.max_person_count,
        }
    }
}

/// 測定結果に添付する監視サマリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub violated: bool,
    pub max_person_count: usize,
}
