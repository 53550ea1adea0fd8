use serde::{Deserialize, Serialize};

use super::geometry::{angle_between, round2};
use super::laterality::{decide_side, LockedArm};
use super::session::Session;
use crate::config::WristConfig;
use crate::pose::{HandFrame, HandLandmarkIndex, PoseFrame, Side};

/// 1フレームぶんの手首角度
///
/// `elbow_detected` が false のとき角度と信頼度は 0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WristAngles {
    /// 前腕ベクトルと手ベクトルのなす角（度）
    pub forearm_to_hand_angle: f32,
    pub wrist_flexion_angle: f32,
    pub wrist_extension_angle: f32,
    pub elbow_detected: bool,
    pub hand_type: Option<Side>,
    pub confidence: f32,
}

impl WristAngles {
    pub fn not_detected(hand_type: Option<Side>) -> Self {
        Self {
            hand_type,
            ..Self::default()
        }
    }
}

/// ロック済みの腕に対する生の計測値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WristMeasurement {
    pub raw_angle: f32,
    /// 屈曲側を正にした生角度（左手は反転済み）
    pub signed_angle: f32,
    /// 外積の判定軸成分（左手反転前）
    pub direction_component: f32,
    pub confidence: f32,
}

/// 肘を基準にした手首屈曲/伸展の計算
///
/// 前腕 = 肘 → 手の手首、手 = 手の手首 → 中指MCP。
/// 生角度に外積の1成分の符号を付け、ニュートラル角（符号付き）との差の
/// 大きさを偏差、差の符号を屈曲/伸展とする
pub struct WristCalculator {
    config: WristConfig,
}

impl WristCalculator {
    pub fn new(config: WristConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WristConfig {
        &self.config
    }

    /// 左右をまだ決めていなければ判定し、ロック状態を返す
    pub fn update_laterality(&self, session: &mut Session, hand: &HandFrame, pose: &PoseFrame) -> Option<LockedArm> {
        if let Some(locked) = session.laterality().locked() {
            return Some(locked);
        }
        let hand_wrist = hand.wrist()?;
        let decision = decide_side(hand_wrist, pose, &self.config)?;
        session
            .laterality_mut()
            .observe(decision, self.config.lock_confirm_frames);
        session.laterality().locked()
    }

    /// 生角度・方向成分・信頼度。可視度不足や退化なら None
    pub fn measure(&self, locked: LockedArm, hand: &HandFrame, pose: &PoseFrame) -> Option<WristMeasurement> {
        if !hand.is_complete() {
            return None;
        }
        let hand_wrist = hand.wrist()?;
        let middle_base = hand.get(HandLandmarkIndex::MiddleMcp)?;
        let elbow = pose.get(locked.arm.elbow)?;
        let pose_wrist = pose.get(locked.arm.wrist)?;

        if !elbow.is_visible(self.config.min_elbow_visibility)
            || !pose_wrist.is_visible(self.config.min_wrist_visibility)
        {
            return None;
        }

        let forearm = hand_wrist.to_vector() - elbow.landmark().to_vector();
        let hand_vec = middle_base.to_vector() - hand_wrist.to_vector();
        let raw_angle = angle_between(&forearm, &hand_vec)?;
        let cross = forearm.cross(&hand_vec);

        let mut confidence = elbow.visibility.min(pose_wrist.visibility);
        if let Some(shoulder) = pose.get(locked.arm.shoulder) {
            confidence = confidence.min(shoulder.visibility);
        }

        let direction_component = cross[self.config.direction_axis.component()];
        let mirrored = self.config.mirror_left && locked.side == Side::Left;
        let flexion_side = (direction_component >= 0.0) != mirrored;
        let signed_angle = if flexion_side { raw_angle } else { -raw_angle };

        Some(WristMeasurement {
            raw_angle,
            signed_angle,
            direction_component,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// 1フレームの手首角度を計算する
    pub fn compute(&self, session: &mut Session, hand: &HandFrame, pose: &PoseFrame) -> WristAngles {
        if !hand.is_complete() || pose.is_empty() {
            return WristAngles::not_detected(session.hand_type());
        }
        let Some(locked) = self.update_laterality(session, hand, pose) else {
            return WristAngles::not_detected(session.hand_type());
        };
        let Some(m) = self.measure(locked, hand, pose) else {
            return WristAngles::not_detected(Some(locked.side));
        };

        let baseline = session
            .neutral_baseline()
            .unwrap_or(self.config.neutral_baseline_deg);
        let diff = m.signed_angle - baseline;
        let deviation = round2(diff.abs());
        let (flexion, extension) = if diff >= 0.0 {
            (deviation, 0.0)
        } else {
            (0.0, deviation)
        };

        WristAngles {
            forearm_to_hand_angle: round2(m.raw_angle),
            wrist_flexion_angle: flexion,
            wrist_extension_angle: extension,
            elbow_detected: true,
            hand_type: Some(locked.side),
            confidence: m.confidence,
        }
    }
}

impl Default for WristCalculator {
    fn default() -> Self {
        Self::new(WristConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pose::{Landmark, PoseKeypoint, PoseKeypointIndex};
    use crate::tracker::laterality::tests::arm_pose;
    use crate::tracker::laterality::LateralityState;
    use proptest::prelude::*;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    /// 手首と中指MCPだけ意味のある手
    pub(crate) fn hand_at(wrist: (f32, f32), middle_mcp: (f32, f32)) -> HandFrame {
        let mut landmarks = vec![Landmark::new(wrist.0, wrist.1, 0.0); HandLandmarkIndex::COUNT];
        landmarks[HandLandmarkIndex::MiddleMcp as usize] = Landmark::new(middle_mcp.0, middle_mcp.1, 0.0);
        HandFrame::new(landmarks)
    }

    /// 右腕が (0.7, 0.8) → (0.7, 0.6) に伸びたポーズ
    pub(crate) fn right_arm_pose(visibility: f32) -> PoseFrame {
        arm_pose((0.3, 0.6, 0.2), (0.3, 0.8, 0.2), (0.7, 0.6, visibility), (0.7, 0.8, visibility))
    }

    #[test]
    fn test_straight_wrist_is_zero_deviation() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let hand = hand_at((0.7, 0.6), (0.7, 0.5));
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        assert!(w.elbow_detected);
        assert_eq!(w.hand_type, Some(Side::Right));
        assert!(approx_eq(w.forearm_to_hand_angle, 0.0, 0.01));
        assert_eq!(w.wrist_flexion_angle + w.wrist_extension_angle, 0.0);
    }

    #[test]
    fn test_bent_wrist_assigns_one_direction() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        // 前腕は上向き (0,-1)、手は右向き (1,0) → 90°
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        assert!(approx_eq(w.forearm_to_hand_angle, 90.0, 0.01));
        // cross z = (0)(0) - (-0.2)(0.1) > 0 → 右手は屈曲
        assert!(approx_eq(w.wrist_flexion_angle, 90.0, 0.01));
        assert_eq!(w.wrist_extension_angle, 0.0);

        let hand = hand_at((0.7, 0.6), (0.6, 0.6));
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        assert_eq!(w.wrist_flexion_angle, 0.0);
        assert!(approx_eq(w.wrist_extension_angle, 90.0, 0.01));
    }

    #[test]
    fn test_left_hand_is_mirrored() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        session.laterality_mut().force_lock(Side::Left);
        let pose = arm_pose((0.3, 0.6, 0.9), (0.3, 0.8, 0.9), (0.7, 0.6, 0.9), (0.7, 0.8, 0.9));
        let hand = hand_at((0.3, 0.6), (0.4, 0.6));
        let w = calc.compute(&mut session, &hand, &pose);
        assert_eq!(w.hand_type, Some(Side::Left));
        assert_eq!(w.wrist_flexion_angle, 0.0);
        assert!(approx_eq(w.wrist_extension_angle, 90.0, 0.01));
    }

    #[test]
    fn test_neutral_baseline_subtracted() {
        let mut config = WristConfig::default();
        config.neutral_baseline_deg = 30.0;
        let calc = WristCalculator::new(config);
        let mut session = Session::new();
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        assert!(approx_eq(w.wrist_flexion_angle, 60.0, 0.01));

        // セッションのキャリブレーション値が優先
        session.calibrate_neutral(10.0);
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        assert!(approx_eq(w.wrist_flexion_angle, 80.0, 0.01));
    }

    #[test]
    fn test_calibrated_neutral_sweep_to_opposite_side() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let pose = right_arm_pose(0.9);
        // +x に傾いた姿勢をニュートラルにする
        let neutral = hand_at((0.7, 0.6), (0.75, 0.5));
        let locked = calc.update_laterality(&mut session, &neutral, &pose).unwrap();
        let m = calc.measure(locked, &neutral, &pose).unwrap();
        assert!(approx_eq(m.signed_angle, 26.57, 0.01));
        session.calibrate_neutral(m.signed_angle);

        // 前腕の線をまたいで -x 側へ一方向に動かす → 全て伸展、単調増加
        let mut last = 0.0;
        for mx in [0.74, 0.72, 0.70, 0.68, 0.66] {
            let w = calc.compute(&mut session, &hand_at((0.7, 0.6), (mx, 0.5)), &pose);
            assert_eq!(w.wrist_flexion_angle, 0.0, "mx={}", mx);
            assert!(w.wrist_extension_angle > last, "mx={} ext={} last={}", mx, w.wrist_extension_angle, last);
            last = w.wrist_extension_angle;
        }
        assert!(approx_eq(last, 48.37, 0.02), "ext={}", last);
    }

    #[test]
    fn test_low_elbow_visibility_not_detected() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        session.laterality_mut().force_lock(Side::Right);
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.25));
        assert!(!w.elbow_detected);
        assert_eq!(w.confidence, 0.0);
        assert_eq!(w.wrist_flexion_angle, 0.0);
        assert_eq!(w.hand_type, Some(Side::Right));
    }

    #[test]
    fn test_missing_inputs_not_detected() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let w = calc.compute(&mut session, &HandFrame::empty(), &right_arm_pose(0.9));
        assert_eq!(w, WristAngles::not_detected(None));
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let w = calc.compute(&mut session, &hand, &PoseFrame::empty());
        assert!(!w.elbow_detected);
        assert_eq!(session.laterality().state(), LateralityState::Unlocked);
    }

    #[test]
    fn test_placeholder_pose_does_not_lock() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let placeholder = PoseFrame::new(vec![PoseKeypoint::default(); PoseKeypointIndex::COUNT]);
        let w = calc.compute(&mut session, &hand, &placeholder);
        assert!(!w.elbow_detected);
        assert_eq!(session.laterality().state(), LateralityState::Unlocked);

        let w = calc.compute(&mut session, &hand, &right_arm_pose(0.95));
        assert!(w.elbow_detected);
        assert_eq!(w.hand_type, Some(Side::Right));
        assert!(approx_eq(w.wrist_flexion_angle, 90.0, 0.01));
    }

    #[test]
    fn test_confidence_is_min_visibility() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let mut pose = right_arm_pose(0.9);
        pose.keypoints[PoseKeypointIndex::RightWrist as usize].visibility = 0.6;
        pose.keypoints[PoseKeypointIndex::RightShoulder as usize] = PoseKeypoint::new(0.7, 0.9, 0.0, 0.5);
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        let w = calc.compute(&mut session, &hand, &pose);
        assert!(approx_eq(w.confidence, 0.5, 1e-6));
    }

    #[test]
    fn test_lock_survives_opposite_side_frames() {
        let calc = WristCalculator::default();
        let mut session = Session::new();
        let hand = hand_at((0.7, 0.6), (0.8, 0.6));
        calc.compute(&mut session, &hand, &right_arm_pose(0.9));
        // 以後は左腕が近く可視度も高いフレーム
        let left_pose = arm_pose((0.3, 0.6, 0.95), (0.3, 0.8, 0.95), (0.9, 0.6, 0.4), (0.9, 0.8, 0.4));
        let left_hand = hand_at((0.3, 0.6), (0.4, 0.6));
        for _ in 0..5 {
            let w = calc.compute(&mut session, &left_hand, &left_pose);
            assert_eq!(w.hand_type, Some(Side::Right));
        }
        session.reset();
        let w = calc.compute(&mut session, &left_hand, &left_pose);
        assert_eq!(w.hand_type, Some(Side::Left));
    }

    fn moved_hand(hand: &HandFrame, scale: f32, d: (f32, f32, f32)) -> HandFrame {
        HandFrame::new(
            hand.landmarks
                .iter()
                .map(|p| Landmark::new(p.x * scale + d.0, p.y * scale + d.1, p.z * scale + d.2))
                .collect(),
        )
    }

    fn moved_pose(pose: &PoseFrame, scale: f32, d: (f32, f32, f32)) -> PoseFrame {
        PoseFrame::new(
            pose.keypoints
                .iter()
                .map(|k| PoseKeypoint::new(k.x * scale + d.0, k.y * scale + d.1, k.z * scale + d.2, k.visibility))
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn prop_wrist_angle_scale_and_translation_invariant(
            wx in 0.2f32..0.8,
            wy in 0.2f32..0.8,
            hand_dir in 0.0f32..360.0,
            hand_len in 0.05f32..0.2,
            arm_dir in 0.0f32..360.0,
            arm_len in 0.1f32..0.3,
            scale in 0.5f32..4.0,
            dx in -1.0f32..1.0,
            dy in -1.0f32..1.0,
            dz in -1.0f32..1.0,
        ) {
            let (hs, hc) = hand_dir.to_radians().sin_cos();
            let (es, ec) = arm_dir.to_radians().sin_cos();
            let hand = hand_at((wx, wy), (wx + hc * hand_len, wy + hs * hand_len));
            let elbow = (wx + ec * arm_len, wy + es * arm_len);
            let pose = arm_pose((0.1, 0.1, 0.9), (0.1, 0.3, 0.9), (wx, wy, 0.9), (elbow.0, elbow.1, 0.9));

            let calc = WristCalculator::default();
            let mut a = Session::new();
            let mut b = Session::new();
            for s in [&mut a, &mut b] {
                s.laterality_mut().force_lock(Side::Right);
                s.calibrate_neutral(10.0);
            }

            let w1 = calc.compute(&mut a, &hand, &pose);
            let d = (dx, dy, dz);
            let w2 = calc.compute(&mut b, &moved_hand(&hand, scale, d), &moved_pose(&pose, scale, d));
            prop_assert!(w1.elbow_detected && w2.elbow_detected);
            // 一直線付近は外積の符号が不安定
            prop_assume!(w1.forearm_to_hand_angle > 5.0 && w1.forearm_to_hand_angle < 175.0);

            prop_assert!((w1.forearm_to_hand_angle - w2.forearm_to_hand_angle).abs() < 0.2,
                "raw {} vs {}", w1.forearm_to_hand_angle, w2.forearm_to_hand_angle);
            prop_assert!((w1.wrist_flexion_angle - w2.wrist_flexion_angle).abs() < 0.2,
                "flexion {} vs {}", w1.wrist_flexion_angle, w2.wrist_flexion_angle);
            prop_assert!((w1.wrist_extension_angle - w2.wrist_extension_angle).abs() < 0.2,
                "extension {} vs {}", w1.wrist_extension_angle, w2.wrist_extension_angle);
        }
    }
}
