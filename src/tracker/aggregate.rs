//! Folds the per-frame finger and wrist samples of one recording into a
//! session range-of-motion report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::finger::{compute_finger_angles, Finger, FingerAngles, FingerJoint};
use super::geometry::round2;
use super::session::{JointKey, Session};
use super::temporal::{TemporalValidator, Verdict};
use super::wrist::{WristAngles, WristCalculator};
use crate::config::Config;
use crate::error::EngineError;
use crate::pose::{FrameInput, Side};

/// フレームを集計に使わなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoHand,
    LowTrackingQuality,
}

/// 1フレームの処理結果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub skipped: Option<SkipReason>,
    /// 指ごとの角度と採用されたか
    pub fingers: Vec<(Finger, FingerAngles, bool)>,
    pub wrist: WristAngles,
    pub wrist_accepted: bool,
}

impl FrameOutcome {
    fn skipped(reason: SkipReason, hand_type: Option<Side>) -> Self {
        Self {
            skipped: Some(reason),
            fingers: Vec::new(),
            wrist: WristAngles::not_detected(hand_type),
            wrist_accepted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    pub processed: usize,
    pub skipped: usize,
    pub rejected_samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WristReport {
    pub max_flexion: f32,
    pub max_extension: f32,
    pub hand_type: Option<Side>,
    pub confidence: f32,
}

/// セッション全体の最大可動域
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRomReport {
    pub fingers: BTreeMap<Finger, FingerAngles>,
    pub wrist: WristReport,
    /// "index.mcp" / "wrist.flexion" などのキーごとの品質 (0.0〜1.0)
    pub quality: BTreeMap<String, f32>,
    pub frames: FrameStats,
}

pub struct SessionAggregator {
    min_tracking_quality: f32,
    validator: TemporalValidator,
    wrist: WristCalculator,
    session: Session,
    stats: FrameStats,
}

impl SessionAggregator {
    pub fn new(config: &Config) -> Self {
        Self {
            min_tracking_quality: config.input.min_tracking_quality,
            validator: TemporalValidator::new(config.temporal.clone()),
            wrist: WristCalculator::new(config.wrist.clone()),
            session: Session::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// 新しい記録を始める。左右ロック・履歴・統計を全て捨てる
    pub fn reset_session(&mut self) {
        self.session.reset();
        self.stats = FrameStats::default();
    }

    /// ニュートラル姿勢のフレームから手首の基準角を取る
    ///
    /// 左右が決まらない、または肘が見えなければ false
    pub fn calibrate_wrist_neutral(&mut self, frame: &FrameInput) -> bool {
        let Some(locked) = self
            .wrist
            .update_laterality(&mut self.session, &frame.hand, &frame.pose)
        else {
            return false;
        };
        match self.wrist.measure(locked, &frame.hand, &frame.pose) {
            Some(m) => {
                self.session.calibrate_neutral(m.signed_angle);
                true
            }
            None => false,
        }
    }

    /// 1フレームを処理する。フレームはタイムスタンプ順に渡すこと
    pub fn process(&mut self, frame: &FrameInput) -> Result<FrameOutcome, EngineError> {
        self.session.begin_frame(frame.timestamp_ms)?;
        self.stats.processed += 1;

        if let Some(side) = frame.handedness {
            self.session.set_handedness(side);
        }
        if frame.tracking_quality < self.min_tracking_quality {
            self.stats.skipped += 1;
            return Ok(FrameOutcome::skipped(SkipReason::LowTrackingQuality, self.session.hand_type()));
        }
        if !frame.hand.is_complete() {
            self.stats.skipped += 1;
            return Ok(FrameOutcome::skipped(SkipReason::NoHand, self.session.hand_type()));
        }

        let mut fingers = Vec::with_capacity(Finger::ALL.len());
        for finger in Finger::ALL {
            let Some(angles) = compute_finger_angles(&frame.hand, finger) else {
                continue;
            };
            let samples = FingerJoint::ALL.map(|joint| (JointKey::Finger(finger, joint), angles.get(joint)));
            let accepted = self.validate_together(&samples);
            fingers.push((finger, angles, accepted));
        }

        let wrist = self.wrist.compute(&mut self.session, &frame.hand, &frame.pose);
        let wrist_accepted = wrist.elbow_detected && {
            let samples = [
                (JointKey::WristFlexion, wrist.wrist_flexion_angle),
                (JointKey::WristExtension, wrist.wrist_extension_angle),
            ];
            self.validate_together(&samples)
        };
        if wrist_accepted {
            self.session.record_wrist_confidence(wrist.confidence);
        }

        Ok(FrameOutcome {
            skipped: None,
            fingers,
            wrist,
            wrist_accepted,
        })
    }

    /// 同じフレームの関節サンプルをまとめて採用/棄却する
    ///
    /// 1つでも棄却されたら全て履歴に入れない。棄却は該当関節にだけ記録する
    fn validate_together(&mut self, samples: &[(JointKey, f32)]) -> bool {
        let verdicts: Vec<Verdict> = samples
            .iter()
            .map(|&(key, value)| match self.session.history(key) {
                Some(history) => self.validator.check(history, value),
                None => self.validator.check(&Default::default(), value),
            })
            .collect();

        if verdicts.iter().all(Verdict::is_accepted) {
            for (&(key, value), verdict) in samples.iter().zip(&verdicts) {
                if let Verdict::Accept { quality } = verdict {
                    self.validator.accept(self.session.history_mut(key), value, *quality);
                }
            }
            return true;
        }

        for (&(key, value), verdict) in samples.iter().zip(&verdicts) {
            if let Verdict::Reject(reason) = verdict {
                debug!(joint = %key, value, "joint sample rejected");
                self.validator.reject(self.session.history_mut(key), *reason);
            }
        }
        self.stats.rejected_samples += 1;
        false
    }

    /// これまでに処理したフレームからの報告。途中でも呼べる
    pub fn report(&self) -> SessionRomReport {
        let mut quality = BTreeMap::new();
        let mut summarize = |key: JointKey| {
            let summary = match self.session.history(key) {
                Some(history) => self.validator.summarize(history),
                None => self.validator.summarize(&Default::default()),
            };
            quality.insert(key.to_string(), summary.quality);
            summary.value
        };

        let mut fingers = BTreeMap::new();
        for finger in Finger::ALL {
            let [mcp, pip, dip] =
                FingerJoint::ALL.map(|joint| summarize(JointKey::Finger(finger, joint)));
            fingers.insert(finger, FingerAngles::new(mcp, pip, dip));
        }

        let max_flexion = summarize(JointKey::WristFlexion);
        let max_extension = summarize(JointKey::WristExtension);

        SessionRomReport {
            fingers,
            wrist: WristReport {
                max_flexion,
                max_extension,
                hand_type: self.session.hand_type(),
                confidence: round2(self.session.mean_wrist_confidence()),
            },
            quality,
            frames: self.stats,
        }
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
