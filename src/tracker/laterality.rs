//! Left/right arm selection for the elbow-referenced wrist angle.
//!
//! `decide_side` picks a side from one frame. `Laterality` turns those
//! per-frame decisions into a session lock: Unlocked -> Candidate -> Locked.
//! Once locked the side never changes until `reset`.

use tracing::{debug, info};

use crate::config::WristConfig;
use crate::pose::{ArmIndices, Landmark, PoseFrame, Side};

/// 左右判定の決め手
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// 手の手首に近いポーズ手首
    Distance,
    /// 肘+手首の可視度差が大きい
    Visibility,
    /// 候補側の肘が見えず、反対側の肘が見えている
    ElbowFloor,
    /// どちらの肘も下限未満、可視度の大きい方
    ElbowFallback,
    /// 可視度で決まらず距離のみ
    DistanceFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideDecision {
    pub side: Side,
    pub reason: DecisionReason,
}

/// 1フレームから左右を判定する
///
/// 肘と手首の可視度が `min_lock_visibility` を超える腕が一本もなければ None。
/// 未検出を0埋めしたポーズで判定しないため
pub fn decide_side(hand_wrist: &Landmark, pose: &PoseFrame, config: &WristConfig) -> Option<SideDecision> {
    if !has_usable_arm(pose, Side::Left, config) && !has_usable_arm(pose, Side::Right, config) {
        return None;
    }

    let distance = |side: Side| {
        pose.get(ArmIndices::for_side(side).wrist)
            .map(|kp| kp.landmark().distance(hand_wrist))
    };
    let nearest = match (distance(Side::Left), distance(Side::Right)) {
        (Some(l), Some(r)) => {
            if l <= r { Side::Left } else { Side::Right }
        }
        (Some(_), None) => Side::Left,
        (None, Some(_)) => Side::Right,
        (None, None) => return None,
    };

    let score = |side: Side| {
        let arm = ArmIndices::for_side(side);
        (pose.visibility(arm.elbow) + pose.visibility(arm.wrist)) / 2.0
    };
    let (left_score, right_score) = (score(Side::Left), score(Side::Right));
    let mut candidate = SideDecision { side: nearest, reason: DecisionReason::Distance };
    if (left_score - right_score).abs() > config.visibility_margin {
        let better = if left_score > right_score { Side::Left } else { Side::Right };
        if better != nearest {
            candidate = SideDecision { side: better, reason: DecisionReason::Visibility };
        }
    }

    let elbow = |side: Side| pose.visibility(ArmIndices::for_side(side).elbow);
    let floor = config.elbow_accept_visibility;
    let other = candidate.side.opposite();

    if elbow(candidate.side) > floor {
        Some(candidate)
    } else if elbow(other) > floor {
        Some(SideDecision { side: other, reason: DecisionReason::ElbowFloor })
    } else if elbow(Side::Left) != elbow(Side::Right) {
        let side = if elbow(Side::Left) > elbow(Side::Right) { Side::Left } else { Side::Right };
        Some(SideDecision { side, reason: DecisionReason::ElbowFallback })
    } else {
        Some(SideDecision { side: nearest, reason: DecisionReason::DistanceFallback })
    }
}

fn has_usable_arm(pose: &PoseFrame, side: Side, config: &WristConfig) -> bool {
    let arm = ArmIndices::for_side(side);
    pose.has_arm(side)
        && pose.visibility(arm.elbow) > config.min_lock_visibility
        && pose.visibility(arm.wrist) > config.min_lock_visibility
}

/// ロックされた腕
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedArm {
    pub side: Side,
    pub arm: ArmIndices,
}

impl LockedArm {
    pub fn new(side: Side) -> Self {
        Self { side, arm: ArmIndices::for_side(side) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LateralityState {
    #[default]
    Unlocked,
    Candidate { side: Side, streak: u32 },
    Locked(LockedArm),
}

impl LateralityState {
    /// 判定結果を1つ受けて次の状態を返す
    pub fn next(self, side: Side, confirm_frames: u32) -> Self {
        let streak = match self {
            Self::Locked(_) => return self,
            Self::Candidate { side: current, streak } if current == side => streak + 1,
            Self::Candidate { .. } | Self::Unlocked => 1,
        };
        if streak >= confirm_frames.max(1) {
            Self::Locked(LockedArm::new(side))
        } else {
            Self::Candidate { side, streak }
        }
    }
}

/// セッション単位の左右ロック
#[derive(Debug, Clone, Default)]
pub struct Laterality {
    state: LateralityState,
}

impl Laterality {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LateralityState {
        self.state
    }

    pub fn locked(&self) -> Option<LockedArm> {
        match self.state {
            LateralityState::Locked(arm) => Some(arm),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked().is_some()
    }

    pub fn observe(&mut self, decision: SideDecision, confirm_frames: u32) -> LateralityState {
        let prev = self.state;
        self.state = prev.next(decision.side, confirm_frames);
        if prev != self.state {
            match self.state {
                LateralityState::Locked(arm) => {
                    info!(side = arm.side.as_str(), reason = ?decision.reason, "laterality locked")
                }
                state => debug!(?state, reason = ?decision.reason, "laterality candidate"),
            }
        }
        self.state
    }

    /// テスト・キャリブレーション用に直接ロックする
    pub fn force_lock(&mut self, side: Side) {
        self.state = LateralityState::Locked(LockedArm::new(side));
    }

    pub fn reset(&mut self) {
        self.state = LateralityState::Unlocked;
    }
}
