//! 数学基础类型
//!
//! - QuatT: 旋转 + 平移，骨骼与挂点的基本变换
//! - QuatTS: 旋转 + 平移 + 统一缩放，角色世界位置
//! - Aabb: 轴对齐包围盒

mod crc;

pub use crc::{crc32, crc32_lowercase};

use glam::{Quat, Vec3};
use std::ops::Mul;

/// 默认比较误差
pub const EPSILON: f32 = 1.0e-4;

// ============================================================================
// QuatT
// ============================================================================

/// 旋转 + 平移
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuatT {
    pub q: Quat,
    pub t: Vec3,
}

impl Default for QuatT {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl QuatT {
    pub const IDENTITY: Self = Self {
        q: Quat::IDENTITY,
        t: Vec3::ZERO,
    };

    /// 累加混合的起点（零四元数、零平移）
    pub const ZERO: Self = Self {
        q: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        t: Vec3::ZERO,
    };

    #[inline]
    pub fn new(q: Quat, t: Vec3) -> Self {
        Self { q, t }
    }

    #[inline]
    pub fn from_translation(t: Vec3) -> Self {
        Self { q: Quat::IDENTITY, t }
    }

    #[inline]
    pub fn from_rotation(q: Quat) -> Self {
        Self { q, t: Vec3::ZERO }
    }

    /// 逆变换（要求 q 为单位四元数）
    #[inline]
    pub fn inverse(&self) -> Self {
        let q = self.q.conjugate();
        Self { q, t: -(q * self.t) }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.q * p + self.t
    }

    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.q * v
    }

    /// 旋转归一化
    #[inline]
    pub fn normalized(&self) -> Self {
        Self {
            q: self.q.normalize(),
            t: self.t,
        }
    }

    /// 平移线性插值，旋转 nlerp（走最短路径）
    pub fn nlerp(&self, other: &QuatT, t: f32) -> Self {
        let other_q = hemisphere_align(other.q, self.q);
        let q = (self.q * (1.0 - t) + other_q * t).normalize();
        Self {
            q,
            t: self.t.lerp(other.t, t),
        }
    }

    /// 数值有效（有限且四元数为单位长度）
    pub fn is_valid(&self) -> bool {
        self.q.is_finite() && self.t.is_finite() && (self.q.length_squared() - 1.0).abs() < 1.0e-3
    }

    /// 误差范围内相等（q 与 -q 视为同一旋转）
    pub fn is_equivalent(&self, other: &QuatT, epsilon: f32) -> bool {
        self.q.dot(other.q).abs() > 1.0 - epsilon && self.t.abs_diff_eq(other.t, epsilon)
    }
}

impl Mul for QuatT {
    type Output = QuatT;

    #[inline]
    fn mul(self, rhs: QuatT) -> QuatT {
        QuatT {
            q: self.q * rhs.q,
            t: self.q * rhs.t + self.t,
        }
    }
}

// ============================================================================
// QuatTS
// ============================================================================

/// 旋转 + 平移 + 统一缩放
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuatTS {
    pub q: Quat,
    pub t: Vec3,
    pub s: f32,
}

impl Default for QuatTS {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl QuatTS {
    pub const IDENTITY: Self = Self {
        q: Quat::IDENTITY,
        t: Vec3::ZERO,
        s: 1.0,
    };

    #[inline]
    pub fn new(q: Quat, t: Vec3, s: f32) -> Self {
        Self { q, t, s }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.q * (p * self.s) + self.t
    }
}

impl From<QuatT> for QuatTS {
    fn from(v: QuatT) -> Self {
        Self { q: v.q, t: v.t, s: 1.0 }
    }
}

impl Mul<QuatT> for QuatTS {
    type Output = QuatTS;

    #[inline]
    fn mul(self, rhs: QuatT) -> QuatTS {
        QuatTS {
            q: self.q * rhs.q,
            t: self.q * (rhs.t * self.s) + self.t,
            s: self.s,
        }
    }
}

impl Mul for QuatTS {
    type Output = QuatTS;

    #[inline]
    fn mul(self, rhs: QuatTS) -> QuatTS {
        QuatTS {
            q: self.q * rhs.q,
            t: self.q * (rhs.t * self.s) + self.t,
            s: self.s * rhs.s,
        }
    }
}

// ============================================================================
// 四元数工具
// ============================================================================

/// 半球修正：与参考四元数点积为负时取反
#[inline]
pub fn hemisphere_align(q: Quat, reference: Quat) -> Quat {
    if q.dot(reference) < 0.0 {
        -q
    } else {
        q
    }
}

/// 两个方向之间的最短旋转，任一方向接近零时返回单位四元数
pub fn rotation_arc(from: Vec3, to: Vec3) -> Quat {
    let a = from.normalize_or_zero();
    let b = to.normalize_or_zero();
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(a, b)
}

// ============================================================================
// 包围盒
// ============================================================================

/// 轴对齐包围盒
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// 空包围盒（min > max）
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// 保证每个轴至少有 `min_extent` 的半径
    pub fn ensure_min_extent(&mut self, min_extent: f32) {
        if self.is_empty() {
            return;
        }
        let center = self.center();
        let half = ((self.max - self.min) * 0.5).max(Vec3::splat(min_extent));
        self.min = center - half;
        self.max = center + half;
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// 合并另一个包围盒
    pub fn merge(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// 变换八个角点后重新求包围盒
    pub fn transformed(&self, location: &QuatTS) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.add_point(location.transform_point(corner));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quatt_inverse() {
        let a = QuatT::new(Quat::from_rotation_z(0.7), Vec3::new(1.0, 2.0, 3.0));
        let id = a * a.inverse();
        assert!(id.is_equivalent(&QuatT::IDENTITY, 1.0e-5));
    }

    #[test]
    fn test_quatt_compose_order() {
        // 先旋转 90 度再平移：子变换的平移被父旋转作用
        let parent = QuatT::new(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::ZERO);
        let child = QuatT::from_translation(Vec3::X);
        let r = parent * child;
        assert!(r.t.abs_diff_eq(Vec3::Y, 1.0e-5));
    }

    #[test]
    fn test_hemisphere_align() {
        let q = Quat::from_rotation_x(0.3);
        assert_eq!(hemisphere_align(-q, q), q);
        assert_eq!(hemisphere_align(q, q), q);
    }

    #[test]
    fn test_aabb_min_extent() {
        let mut bb = Aabb::EMPTY;
        assert!(bb.is_empty());
        bb.add_point(Vec3::ZERO);
        bb.ensure_min_extent(0.5);
        assert!(bb.contains(Vec3::splat(0.49)));
        assert!(!bb.contains(Vec3::splat(0.51)));
    }
}
