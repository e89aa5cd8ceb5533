//! 混合数值核心
//!
//! 累加、归一化与逐骨骼混合公式，供命令执行使用。

use glam::{Quat, Vec3};

use crate::math::{hemisphere_align, QuatT};

/// 按权重累加旋转（先做半球修正）
#[inline]
pub fn accumulate_rotation(dst: &mut Quat, sample: Quat, weight: f32, reference: Quat) {
    *dst = *dst + hemisphere_align(sample, reference) * weight;
}

/// 累加结果的参考四元数：尚未累加时用采样本身
#[inline]
pub fn accumulation_reference(accum: Quat, sample: Quat) -> Quat {
    if accum.length_squared() > 0.0 {
        accum
    } else {
        sample
    }
}

/// 归一化累加四元数，自点积低于 epsilon 时返回单位四元数
#[inline]
pub fn normalize_accumulated(q: Quat, epsilon: f32) -> Quat {
    let len2 = q.dot(q);
    if len2 < epsilon {
        Quat::IDENTITY
    } else {
        q * (1.0 / len2.sqrt())
    }
}

/// 覆盖混合：按分量权重插值（x 旋转，y 平移）
#[inline]
pub fn blend_override(base: QuatT, layer: QuatT, weight: Vec3) -> QuatT {
    let layer_q = hemisphere_align(layer.q, base.q);
    let q = (base.q * (1.0 - weight.x) + layer_q * weight.x).normalize();
    QuatT {
        q,
        t: base.t.lerp(layer.t, weight.y),
    }
}

/// 加法混合：`slerp(I, delta, w) * base`，平移按权重叠加
#[inline]
pub fn blend_additive(base: QuatT, delta: QuatT, weight: Vec3) -> QuatT {
    let delta_q = hemisphere_align(delta.q, Quat::IDENTITY);
    QuatT {
        q: (Quat::IDENTITY.slerp(delta_q, weight.x) * base.q).normalize(),
        t: base.t + delta.t * weight.y,
    }
}

/// 缩放混合
#[inline]
pub fn blend_scale(base: Vec3, layer: Vec3, weight: f32, mode_additive: bool) -> Vec3 {
    if mode_additive {
        base * Vec3::ONE.lerp(layer, weight)
    } else {
        base.lerp(layer, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_flips_hemisphere() {
        let q = Quat::from_rotation_z(0.4);
        let mut acc = QuatT::ZERO.q;
        accumulate_rotation(&mut acc, q, 0.5, Quat::IDENTITY);
        accumulate_rotation(&mut acc, -q, 0.5, Quat::IDENTITY);
        let n = normalize_accumulated(acc, 1.0e-6);
        assert!(n.dot(q) > 0.9999);
    }

    #[test]
    fn test_normalize_degenerate_to_identity() {
        assert_eq!(normalize_accumulated(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0e-5), 1.0e-6), Quat::IDENTITY);
    }

    #[test]
    fn test_additive_zero_weight_is_base() {
        let base = QuatT::new(Quat::from_rotation_x(0.3), Vec3::X);
        let delta = QuatT::new(Quat::from_rotation_y(1.0), Vec3::Y);
        let r = blend_additive(base, delta, Vec3::ZERO);
        assert!(r.is_equivalent(&base, 1.0e-5));
        let full = blend_additive(base, delta, Vec3::ONE);
        assert!(full.q.dot(delta.q * base.q).abs() > 0.9999);
        assert!(full.t.abs_diff_eq(Vec3::X + Vec3::Y, 1.0e-6));
    }

    #[test]
    fn test_override_per_component() {
        let base = QuatT::new(Quat::IDENTITY, Vec3::ZERO);
        let layer = QuatT::new(Quat::from_rotation_z(1.0), Vec3::splat(2.0));
        // 只混合平移
        let r = blend_override(base, layer, Vec3::new(0.0, 0.5, 0.0));
        assert!(r.q.abs_diff_eq(Quat::IDENTITY, 1.0e-6));
        assert!(r.t.abs_diff_eq(Vec3::ONE, 1.0e-6));
    }
}
