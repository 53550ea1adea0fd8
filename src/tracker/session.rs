use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use super::finger::{Finger, FingerJoint};
use super::laterality::Laterality;
use super::temporal::JointHistory;
use crate::error::EngineError;
use crate::pose::Side;

/// 時系列履歴のキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JointKey {
    Finger(Finger, FingerJoint),
    WristFlexion,
    WristExtension,
}

impl fmt::Display for JointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finger(finger, joint) => write!(f, "{}.{}", finger.as_str(), joint.as_str()),
            Self::WristFlexion => f.write_str("wrist.flexion"),
            Self::WristExtension => f.write_str("wrist.extension"),
        }
    }
}

/// 1回の記録ぶんの可変状態
///
/// 左右ロック、関節ごとの履歴、手首のニュートラル補正を持つ。
/// 記録ごとに `reset` すること。前の記録の状態を持ち越すと左右や最大値が混ざる
#[derive(Debug, Default)]
pub struct Session {
    laterality: Laterality,
    histories: BTreeMap<JointKey, JointHistory>,
    neutral_baseline: Option<f32>,
    last_timestamp_ms: Option<u64>,
    last_handedness: Option<Side>,
    wrist_confidence_sum: f32,
    wrist_confidence_frames: usize,
    recording: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい記録の開始。全状態を破棄する
    pub fn reset(&mut self) {
        let recording = self.recording + 1;
        *self = Self {
            recording,
            ..Self::default()
        };
        info!(recording, "session reset");
    }

    /// 何回目の記録か（reset のたびに増える）
    pub fn recording(&self) -> u32 {
        self.recording
    }

    /// フレーム順序の検査。タイムスタンプが巻き戻ったらエラー
    pub fn begin_frame(&mut self, timestamp_ms: u64) -> Result<(), EngineError> {
        if let Some(previous_ms) = self.last_timestamp_ms {
            if timestamp_ms < previous_ms {
                return Err(EngineError::OutOfOrderFrame {
                    previous_ms,
                    current_ms: timestamp_ms,
                });
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);
        Ok(())
    }

    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp_ms
    }

    pub fn laterality(&self) -> &Laterality {
        &self.laterality
    }

    pub fn laterality_mut(&mut self) -> &mut Laterality {
        &mut self.laterality
    }

    pub fn history(&self, key: JointKey) -> Option<&JointHistory> {
        self.histories.get(&key)
    }

    pub fn history_mut(&mut self, key: JointKey) -> &mut JointHistory {
        self.histories.entry(key).or_default()
    }

    pub fn histories(&self) -> impl Iterator<Item = (&JointKey, &JointHistory)> {
        self.histories.iter()
    }

    /// この記録で使うニュートラル角（度、屈曲側が正）。設定値より優先される
    pub fn neutral_baseline(&self) -> Option<f32> {
        self.neutral_baseline
    }

    pub fn calibrate_neutral(&mut self, signed_angle_deg: f32) {
        info!(baseline = signed_angle_deg, "wrist neutral calibrated");
        self.neutral_baseline = Some(signed_angle_deg);
    }

    pub fn set_handedness(&mut self, side: Side) {
        self.last_handedness = Some(side);
    }

    /// ロック済みの側、なければトラッカーの左右ラベル
    pub fn hand_type(&self) -> Option<Side> {
        self.laterality
            .locked()
            .map(|arm| arm.side)
            .or(self.last_handedness)
    }

    pub fn record_wrist_confidence(&mut self, confidence: f32) {
        self.wrist_confidence_sum += confidence;
        self.wrist_confidence_frames += 1;
    }

    pub fn mean_wrist_confidence(&self) -> f32 {
        if self.wrist_confidence_frames == 0 {
            return 0.0;
        }
        self.wrist_confidence_sum / self.wrist_confidence_frames as f32
    }
}
