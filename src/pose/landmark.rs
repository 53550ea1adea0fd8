use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// 手のランドマーク 21 点のインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmarkIndex {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmarkIndex {
    pub const COUNT: usize = 21;
}

/// 単一ランドマーク
///
/// x, y はフレーム基準の正規化座標 (0.0〜1.0)、z は相対深度（単位なし）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        (self.to_vector() - other.to_vector()).norm()
    }
}

/// 1フレーム分の手ランドマーク。未検出なら空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandFrame {
    pub landmarks: Vec<Landmark>,
}

impl HandFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// 21点そろっているか
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= HandLandmarkIndex::COUNT
    }

    pub fn get(&self, index: HandLandmarkIndex) -> Option<&Landmark> {
        self.landmarks.get(index as usize)
    }

    pub fn wrist(&self) -> Option<&Landmark> {
        self.get(HandLandmarkIndex::Wrist)
    }
}
