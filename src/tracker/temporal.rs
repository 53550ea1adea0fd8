//! Temporal consistency check and smoothed maxima for per-joint angle streams.
//!
//! Each joint keeps a bounded window of accepted samples. A new sample is
//! rejected when it jumps too far from the last accepted one or disagrees with
//! the recent window. The session maximum is the mean of the top accepted
//! samples rather than a single raw peak.

use std::collections::VecDeque;

use tracing::debug;

use super::geometry::round2;
use crate::config::TemporalConfig;

/// 棄却理由
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// 直前の採用値からの変化が大きすぎる
    SingleStep { delta: f32 },
    /// 直近ウィンドウとの最大偏差が閾値超え
    Inconsistent { max_deviation: f32 },
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accept { quality: f32 },
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// 1関節ぶんの採用履歴
#[derive(Debug, Clone, Default)]
pub struct JointHistory {
    window: VecDeque<f32>,
    /// 採用値の上位（降順）
    top: Vec<f32>,
    accepted: usize,
    rejected: usize,
    consecutive_rejections: usize,
    quality_sum: f32,
}

impl JointHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<f32> {
        self.window.back().copied()
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn raw_max(&self) -> Option<f32> {
        self.top.first().copied()
    }
}

/// セッション終了時の関節ごとの集計
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSummary {
    pub value: f32,
    pub quality: f32,
    pub accepted: usize,
}

pub struct TemporalValidator {
    config: TemporalConfig,
}

impl TemporalValidator {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemporalConfig {
        &self.config
    }

    /// 履歴を変更せずに判定だけ行う
    pub fn check(&self, history: &JointHistory, value: f32) -> Verdict {
        if !value.is_finite() {
            return Verdict::Reject(RejectReason::NotFinite);
        }
        let Some(last) = history.last_accepted() else {
            return Verdict::Accept { quality: 1.0 };
        };

        let delta = (value - last).abs();
        if delta > self.config.max_change_per_frame {
            return Verdict::Reject(RejectReason::SingleStep { delta });
        }

        let k = self.config.consistency_window.max(1);
        let recent = history.window.iter().rev().take(k);
        let (mut max_dev, mut sum_dev, mut n) = (0.0f32, 0.0f32, 0usize);
        for sample in recent {
            let dev = (value - sample).abs();
            max_dev = max_dev.max(dev);
            sum_dev += dev;
            n += 1;
        }
        let threshold = self.config.consistency_threshold;
        if max_dev > threshold {
            return Verdict::Reject(RejectReason::Inconsistent { max_deviation: max_dev });
        }
        let mean_dev = sum_dev / n as f32;
        Verdict::Accept {
            quality: (1.0 - mean_dev / threshold).max(0.0),
        }
    }

    pub fn accept(&self, history: &mut JointHistory, value: f32, quality: f32) {
        history.window.push_back(value);
        while history.window.len() > self.config.window_size {
            history.window.pop_front();
        }

        let pos = history.top.iter().position(|&v| value > v).unwrap_or(history.top.len());
        history.top.insert(pos, value);
        history.top.truncate(self.config.top_k.max(1));

        history.accepted += 1;
        history.quality_sum += quality;
        history.consecutive_rejections = 0;
    }

    /// 棄却を記録する。連続棄却が上限に達したらウィンドウを張り直して true
    pub fn reject(&self, history: &mut JointHistory, reason: RejectReason) -> bool {
        history.rejected += 1;
        history.consecutive_rejections += 1;
        debug!(?reason, consecutive = history.consecutive_rejections, "sample rejected");

        let limit = self.config.max_consecutive_rejections;
        if limit > 0 && history.consecutive_rejections >= limit {
            debug!(limit, "re-anchoring joint window after consecutive rejections");
            history.window.clear();
            history.consecutive_rejections = 0;
            return true;
        }
        false
    }

    /// 判定して履歴に反映する
    pub fn validate(&self, history: &mut JointHistory, value: f32) -> Verdict {
        let verdict = self.check(history, value);
        match verdict {
            Verdict::Accept { quality } => self.accept(history, value, quality),
            Verdict::Reject(reason) => {
                self.reject(history, reason);
            }
        }
        verdict
    }

    /// 平滑化最大値と品質スコア
    ///
    /// 採用数が `min_valid_frames` 未満なら生の最大値を低品質で返す。
    /// 一度も採用されていなければ 0 / 品質 0
    pub fn summarize(&self, history: &JointHistory) -> JointSummary {
        let accepted = history.accepted;
        let Some(raw_max) = history.raw_max() else {
            return JointSummary {
                value: 0.0,
                quality: 0.0,
                accepted,
            };
        };

        if accepted < self.config.min_valid_frames {
            return JointSummary {
                value: round2(raw_max),
                quality: self.config.low_quality_score,
                accepted,
            };
        }

        let smoothed = history.top.iter().sum::<f32>() / history.top.len() as f32;
        let quality = (history.quality_sum / accepted as f32).clamp(0.0, 1.0);
        JointSummary {
            value: round2(smoothed),
            quality,
            accepted,
        }
    }
}

impl Default for TemporalValidator {
    fn default() -> Self {
        Self::new(TemporalConfig::default())
    }
}
