use serde::{Deserialize, Serialize};

use super::keypoint::PoseFrame;
use super::landmark::HandFrame;

/// 左右
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "LEFT", alias = "Left", alias = "left")]
    Left,
    #[serde(rename = "RIGHT", alias = "Right", alias = "right")]
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// トラッカーから受け取る1フレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInput {
    /// 記録開始からのミリ秒
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hand: HandFrame,
    #[serde(default)]
    pub pose: PoseFrame,
    /// トラッカーの左右ラベル
    #[serde(default)]
    pub handedness: Option<Side>,
    #[serde(default = "default_tracking_quality")]
    pub tracking_quality: f32,
}

fn default_tracking_quality() -> f32 { 1.0 }

impl Default for FrameInput {
    fn default() -> Self {
        Self::new(0, HandFrame::empty(), PoseFrame::empty())
    }
}

impl FrameInput {
    pub fn new(timestamp_ms: u64, hand: HandFrame, pose: PoseFrame) -> Self {
        Self {
            timestamp_ms,
            hand,
            pose,
            handedness: None,
            tracking_quality: default_tracking_quality(),
        }
    }

    pub fn with_handedness(mut self, side: Side) -> Self {
        self.handedness = Some(side);
        self
    }

    pub fn with_tracking_quality(mut self, quality: f32) -> Self {
        self.tracking_quality = quality;
        self
    }
}
