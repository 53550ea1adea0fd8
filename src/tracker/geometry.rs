//! Vector helpers shared by the finger and wrist calculators.

use nalgebra::Vector3;

use crate::pose::Landmark;

/// これ未満の長さのベクトルは退化として扱う
pub const DEGENERATE_EPS: f32 = 1e-6;

/// 2ベクトルのなす角（度）。退化ベクトルなら None
pub fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> Option<f32> {
    let na = a.norm();
    let nb = b.norm();
    if na < DEGENERATE_EPS || nb < DEGENERATE_EPS {
        return None;
    }
    let cos = (a.dot(b) / (na * nb)).clamp(-1.0, 1.0);
    let deg = cos.acos().to_degrees();
    if deg.is_finite() { Some(deg) } else { None }
}

/// p2 を頂点とする p1-p2-p3 の内角（度）
///
/// 0° = 折り返し、180° = 一直線。退化時は None
pub fn vertex_angle(p1: &Landmark, p2: &Landmark, p3: &Landmark) -> Option<f32> {
    let v1 = p1.to_vector() - p2.to_vector();
    let v2 = p3.to_vector() - p2.to_vector();
    angle_between(&v1, &v2)
}

/// 小数点以下2桁に丸める
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
