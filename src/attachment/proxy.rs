//! 碰撞代理
//!
//! 绑定在骨骼上的简单碰撞体（胶囊/菱柱），供挂点模拟把摆锤、弹簧投影出去。
//! `params` 的 xyz 为核心盒半长，w 为外扩半径；只有 x 非零时即为沿 X 轴的胶囊。

use glam::{Vec3, Vec4};

use crate::math::{crc32_lowercase, QuatT, QuatTS};

/// 新建代理的默认参数：半径 0.25 的球
pub const DEFAULT_PROXY_PARAMS: Vec4 = Vec4::new(0.0, 0.0, 0.0, 0.25);

/// 方向投影的二分迭代次数
const DIRECTED_ITERATIONS: usize = 16;

/// 碰撞代理
#[derive(Clone, Debug, PartialEq)]
pub struct Proxy {
    name: String,
    name_crc: u32,
    joint_name: String,
    pub(crate) joint_id: i32,
    /// 绑定姿态下的模型空间变换
    pub(crate) absolute_default: QuatT,
    /// 相对骨骼的偏移
    pub(crate) relative_default: QuatT,
    /// 本帧模型空间变换
    pub(crate) model_relative: QuatT,
    /// 上一帧模型空间变换
    pub(crate) model_relative_prev: QuatT,
    pub params: Vec4,
    /// 用途：0 布料，1 模拟，2 布娃娃
    pub purpose: u8,
    pub hidden: bool,
}

impl Proxy {
    pub(crate) fn new(name: &str, joint_name: &str, absolute_default: QuatT, params: Vec4, purpose: u8) -> Self {
        let name = name.to_lowercase();
        Self {
            name_crc: crc32_lowercase(&name),
            name,
            joint_name: joint_name.to_string(),
            joint_id: -1,
            absolute_default,
            relative_default: QuatT::IDENTITY,
            model_relative: absolute_default,
            model_relative_prev: absolute_default,
            params,
            purpose,
            hidden: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn name_crc(&self) -> u32 {
        self.name_crc
    }

    #[inline]
    pub fn joint_name(&self) -> &str {
        &self.joint_name
    }

    #[inline]
    pub fn joint_id(&self) -> i32 {
        self.joint_id
    }

    #[inline]
    pub fn relative_default(&self) -> QuatT {
        self.relative_default
    }

    #[inline]
    pub fn model_relative(&self) -> QuatT {
        self.model_relative
    }

    #[inline]
    pub fn model_relative_prev(&self) -> QuatT {
        self.model_relative_prev
    }

    /// 按绑定姿态计算相对骨骼的偏移
    pub(crate) fn project(&mut self, joint_default_absolute: QuatT) {
        self.relative_default = joint_default_absolute.inverse() * self.absolute_default;
        self.model_relative = joint_default_absolute * self.relative_default;
        self.model_relative_prev = self.model_relative;
    }

    #[inline]
    fn half_extents(&self) -> Vec3 {
        self.params.truncate().abs()
    }

    /// 局部空间点到核心盒的最近点
    #[inline]
    fn closest_core_point(&self, local: Vec3) -> Vec3 {
        let h = self.half_extents();
        local.clamp(-h, h)
    }

    /// 局部空间点是否在（外扩 `margin` 后的）代理内部
    fn contains_local(&self, local: Vec3, margin: f32) -> bool {
        let r = self.params.w + margin;
        (local - self.closest_core_point(local)).length_squared() < r * r
    }

    /// 把局部空间点推到表面，外扩 `margin`
    fn push_out_local(&self, local: Vec3, margin: f32) -> Option<Vec3> {
        let r = self.params.w + margin;
        let core = self.closest_core_point(local);
        let d = local - core;
        let dist = d.length();
        if dist >= r {
            return None;
        }
        if dist > 1.0e-6 {
            return Some(core + d / dist * r);
        }

        // 点在核心盒内部：沿穿透最浅的轴推出
        let h = self.half_extents();
        let depth = h - local.abs();
        let mut axis = 0;
        for i in 1..3 {
            if depth[i] < depth[axis] {
                axis = i;
            }
        }
        let mut out = local;
        let sign = if local[axis] < 0.0 { -1.0 } else { 1.0 };
        out[axis] = sign * (h[axis] + r);
        Some(out)
    }

    /// 把世界空间点沿最短方向推出代理，`frame` 为代理的世界变换
    pub fn push_out(&self, frame: &QuatTS, point: Vec3, margin: f32) -> Option<Vec3> {
        let local = to_local(frame, point);
        self.push_out_local(local, margin / frame.s.max(1.0e-6))
            .map(|p| frame.transform_point(p))
    }

    /// 把世界空间点沿给定方向推出代理
    pub fn push_out_directed(&self, frame: &QuatTS, point: Vec3, direction: Vec3, margin: f32) -> Option<Vec3> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return self.push_out(frame, point, margin);
        }
        let scale = frame.s.max(1.0e-6);
        let margin_local = margin / scale;
        let local = to_local(frame, point);
        if !self.contains_local(local, margin_local) {
            return None;
        }
        let dir_local = frame.q.inverse() * dir;

        // 沿方向走出包围球必然离开代理
        let reach = self.half_extents().length() + self.params.w + margin_local + local.length();
        let (mut inside, mut outside) = (0.0_f32, reach * 2.0);
        for _ in 0..DIRECTED_ITERATIONS {
            let mid = (inside + outside) * 0.5;
            if self.contains_local(local + dir_local * mid, margin_local) {
                inside = mid;
            } else {
                outside = mid;
            }
        }
        Some(frame.transform_point(local + dir_local * outside))
    }
}

#[inline]
fn to_local(frame: &QuatTS, p: Vec3) -> Vec3 {
    frame.q.inverse() * (p - frame.t) / frame.s.max(1.0e-6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere() -> Proxy {
        Proxy::new("Ball", "root", QuatT::IDENTITY, DEFAULT_PROXY_PARAMS, 1)
    }

    #[test]
    fn test_name_lowercased() {
        let p = sphere();
        assert_eq!(p.name(), "ball");
        assert_eq!(p.name_crc(), crc32_lowercase("BALL"));
    }

    #[test]
    fn test_sphere_push_out() {
        let p = sphere();
        let frame = QuatTS::IDENTITY;
        let pushed = p.push_out(&frame, Vec3::new(0.1, 0.0, 0.0), 0.0).unwrap();
        assert!((pushed - Vec3::new(0.25, 0.0, 0.0)).length() < 1.0e-5);
        assert!(p.push_out(&frame, Vec3::new(1.0, 0.0, 0.0), 0.0).is_none());
    }

    #[test]
    fn test_capsule_core_push_out() {
        let p = Proxy::new("arm", "root", QuatT::IDENTITY, Vec4::new(0.5, 0.0, 0.0, 0.1), 1);
        let frame = QuatTS::IDENTITY;
        // 核心线段上的点沿最浅轴推出
        let pushed = p.push_out(&frame, Vec3::new(0.2, 0.0, 0.0), 0.0).unwrap();
        assert!((pushed.length() - Vec3::new(0.2, 0.1, 0.0).length()).abs() < 1.0e-4 || pushed.x.abs() > 0.5);
        assert!(!p.contains_local(pushed, -1.0e-4));
    }

    #[test]
    fn test_directed_push_out() {
        let p = sphere();
        let frame = QuatTS::new(glam::Quat::IDENTITY, Vec3::new(0.0, 0.0, 1.0), 1.0);
        let pushed = p
            .push_out_directed(&frame, Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 0.0)
            .unwrap();
        assert!((pushed.z - 1.25).abs() < 1.0e-3);
        assert!(pushed.x.abs() < 1.0e-5);
    }
}
