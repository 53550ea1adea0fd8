use serde::{Deserialize, Serialize};

use super::geometry::{round2, vertex_angle};
use crate::pose::{HandFrame, HandLandmarkIndex};

/// 評価対象の指（親指は対象外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }

    /// MCP, PIP, DIP の順に (p1, 頂点, p3)
    pub fn joint_triplets(&self) -> [[HandLandmarkIndex; 3]; 3] {
        use HandLandmarkIndex::*;
        let [mcp, pip, dip, tip] = match self {
            Self::Index => [IndexMcp, IndexPip, IndexDip, IndexTip],
            Self::Middle => [MiddleMcp, MiddlePip, MiddleDip, MiddleTip],
            Self::Ring => [RingMcp, RingPip, RingDip, RingTip],
            Self::Pinky => [PinkyMcp, PinkyPip, PinkyDip, PinkyTip],
        };
        [[Wrist, mcp, pip], [mcp, pip, dip], [pip, dip, tip]]
    }
}

/// 指の関節
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerJoint {
    Mcp,
    Pip,
    Dip,
}

impl FingerJoint {
    pub const ALL: [FingerJoint; 3] = [FingerJoint::Mcp, FingerJoint::Pip, FingerJoint::Dip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcp => "mcp",
            Self::Pip => "pip",
            Self::Dip => "dip",
        }
    }
}

/// 1フレーム・1指ぶんの屈曲角（度、0° = まっすぐ）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerAngles {
    pub mcp_angle: f32,
    pub pip_angle: f32,
    pub dip_angle: f32,
    /// MCP + PIP + DIP
    pub total_active_rom: f32,
}

impl FingerAngles {
    pub fn new(mcp_angle: f32, pip_angle: f32, dip_angle: f32) -> Self {
        Self {
            mcp_angle,
            pip_angle,
            dip_angle,
            total_active_rom: round2(mcp_angle + pip_angle + dip_angle),
        }
    }

    pub fn get(&self, joint: FingerJoint) -> f32 {
        match joint {
            FingerJoint::Mcp => self.mcp_angle,
            FingerJoint::Pip => self.pip_angle,
            FingerJoint::Dip => self.dip_angle,
        }
    }
}

/// 三点の屈曲角。一直線で 0°、退化した三点も 0°
pub fn flexion_angle(hand: &HandFrame, triplet: [HandLandmarkIndex; 3]) -> f32 {
    let points = (hand.get(triplet[0]), hand.get(triplet[1]), hand.get(triplet[2]));
    let (Some(p1), Some(p2), Some(p3)) = points else {
        return 0.0;
    };
    match vertex_angle(p1, p2, p3) {
        Some(interior) => round2((180.0 - interior).max(0.0)),
        None => 0.0,
    }
}

/// 指1本の MCP/PIP/DIP 屈曲角を計算
///
/// 21点そろっていなければ None
pub fn compute_finger_angles(hand: &HandFrame, finger: Finger) -> Option<FingerAngles> {
    if !hand.is_complete() {
        return None;
    }
    let [mcp, pip, dip] = finger.joint_triplets();
    Some(FingerAngles::new(
        flexion_angle(hand, mcp),
        flexion_angle(hand, pip),
        flexion_angle(hand, dip),
    ))
}
