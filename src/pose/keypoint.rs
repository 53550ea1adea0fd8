use serde::{Deserialize, Serialize};

use super::landmark::Landmark;
use super::Side;

/// 33点ポーズモデルのうち腕の左右判定に使うインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseKeypointIndex {
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
}

impl PoseKeypointIndex {
    /// ポーズモデルの総キーポイント数
    pub const COUNT: usize = 33;
}

/// 片腕ぶんのキーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmIndices {
    pub shoulder: PoseKeypointIndex,
    pub elbow: PoseKeypointIndex,
    pub wrist: PoseKeypointIndex,
}

impl ArmIndices {
    pub fn for_side(side: Side) -> Self {
        use PoseKeypointIndex::*;
        match side {
            Side::Left => Self {
                shoulder: LeftShoulder,
                elbow: LeftElbow,
                wrist: LeftWrist,
            },
            Side::Right => Self {
                shoulder: RightShoulder,
                elbow: RightElbow,
                wrist: RightWrist,
            },
        }
    }
}

/// 可視度付きのポーズキーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseKeypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    /// 可視度スコア (0.0〜1.0)
    #[serde(default)]
    pub visibility: f32,
}

impl PoseKeypoint {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// 可視度が閾値を超えているか
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }

    pub fn landmark(&self) -> Landmark {
        Landmark::new(self.x, self.y, self.z)
    }
}

/// 1フレーム分のポーズ。未検出なら空、途中までしかないこともある
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseFrame {
    pub keypoints: Vec<PoseKeypoint>,
}

impl PoseFrame {
    pub fn new(keypoints: Vec<PoseKeypoint>) -> Self {
        Self { keypoints }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, index: PoseKeypointIndex) -> Option<&PoseKeypoint> {
        self.keypoints.get(index as usize)
    }

    /// 指定インデックスの可視度。無ければ 0
    pub fn visibility(&self, index: PoseKeypointIndex) -> f32 {
        self.get(index).map_or(0.0, |kp| kp.visibility)
    }

    /// 片腕の肘と手首がそろっているか
    pub fn has_arm(&self, side: Side) -> bool {
        let arm = ArmIndices::for_side(side);
        self.get(arm.elbow).is_some() && self.get(arm.wrist).is_some()
    }
}
