//! 动画驱动 IK
//!
//! 在绝对姿态计算完成后执行：
//! - CCD 迭代求解
//! - 支持欧拉角限制
//! - 支持单轴模式（膝盖、肘部等）
//!
//! 求解结果写回相对变换，并沿子骨骼缓存更新绝对变换。

use glam::{EulerRot, Mat3, Quat, Vec3};
use std::f32::consts::PI;

use super::default_skeleton::DefaultSkeleton;
use super::pose_data::PoseData;

// ============================================================================
// IK 配置
// ============================================================================

/// IK 链节点
#[derive(Clone, Debug)]
pub struct IkLink {
    /// 骨骼索引
    pub joint: usize,
    /// 是否有角度限制
    pub has_limits: bool,
    /// 角度下限 (弧度)
    pub limit_min: Vec3,
    /// 角度上限 (弧度)
    pub limit_max: Vec3,
}

impl IkLink {
    pub fn new(joint: usize) -> Self {
        Self {
            joint,
            has_limits: false,
            limit_min: Vec3::ZERO,
            limit_max: Vec3::ZERO,
        }
    }

    pub fn with_limits(joint: usize, limit_min: Vec3, limit_max: Vec3) -> Self {
        Self {
            joint,
            has_limits: true,
            limit_min,
            limit_max,
        }
    }
}

/// IK 链节点求解状态
#[derive(Clone, Debug, Default)]
struct LinkState {
    /// 上一次迭代的欧拉角（用于连续性）
    prev_angle: Vec3,
    /// 单轴模式下的累积角度
    plane_angle: f32,
    /// 求解开始时的动画旋转
    anim_rotation: Quat,
    /// 最佳旋转（用于回退）
    best_rotation: Quat,
}

/// 求解轴
#[derive(Clone, Copy, Debug, PartialEq)]
enum SolveAxis {
    X,
    Y,
    Z,
}

impl SolveAxis {
    fn axis(self) -> Vec3 {
        match self {
            SolveAxis::X => Vec3::X,
            SolveAxis::Y => Vec3::Y,
            SolveAxis::Z => Vec3::Z,
        }
    }

    fn limits(self, link: &IkLink) -> (f32, f32) {
        match self {
            SolveAxis::X => (link.limit_min.x, link.limit_max.x),
            SolveAxis::Y => (link.limit_min.y, link.limit_max.y),
            SolveAxis::Z => (link.limit_min.z, link.limit_max.z),
        }
    }
}

// ============================================================================
// IK 链
// ============================================================================

/// 动画驱动 IK 链
#[derive(Clone, Debug)]
pub struct IkChain {
    /// 末端骨骼
    pub effector: usize,
    /// 链节点，从靠近末端的骨骼开始
    pub links: Vec<IkLink>,
    /// 迭代次数
    pub iterations: u32,
    /// 单次迭代角度限制
    pub limit_angle: f32,
    /// 模型空间目标位置，None 时不求解
    pub goal: Option<Vec3>,
    /// 是否启用
    pub enabled: bool,
}

impl IkChain {
    pub fn new(effector: usize, links: Vec<IkLink>) -> Self {
        Self {
            effector,
            links,
            iterations: 16,
            limit_angle: PI * 0.25,
            goal: None,
            enabled: true,
        }
    }

    /// 求解 IK，返回末端与目标的最终距离
    pub fn solve(&self, pose: &mut PoseData, skeleton: &DefaultSkeleton) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        let goal = self.goal?;
        let count = pose.joint_count();
        if self.effector >= count || self.links.iter().any(|l| l.joint >= count) {
            log::warn!("[IK] 链骨骼索引越界，跳过求解");
            return None;
        }

        let mut states: Vec<LinkState> = self
            .links
            .iter()
            .map(|link| {
                let rotation = pose.relative(link.joint).q;
                LinkState {
                    anim_rotation: rotation,
                    best_rotation: rotation,
                    ..LinkState::default()
                }
            })
            .collect();

        let mut best_distance = (pose.absolute(self.effector).t - goal).length();

        for iteration in 0..self.iterations {
            self.solve_iteration(pose, skeleton, goal, iteration, &mut states);

            let distance = (pose.absolute(self.effector).t - goal).length();
            if distance < best_distance {
                best_distance = distance;
                for (state, link) in states.iter_mut().zip(&self.links) {
                    state.best_rotation = pose.relative(link.joint).q;
                }
            } else {
                // 恢复最佳结果并退出
                for (state, link) in states.iter().zip(&self.links) {
                    let mut rel = pose.relative(link.joint);
                    rel.q = state.best_rotation;
                    pose.set_relative(link.joint, rel);
                    update_absolute_recursive(pose, skeleton, link.joint);
                }
                break;
            }
        }

        Some(best_distance)
    }

    fn solve_iteration(
        &self,
        pose: &mut PoseData,
        skeleton: &DefaultSkeleton,
        goal: Vec3,
        iteration: u32,
        states: &mut [LinkState],
    ) {
        for (chain_idx, link) in self.links.iter().enumerate() {
            if link.joint == self.effector {
                continue;
            }

            if link.has_limits {
                if let Some(axis) = detect_plane_solve_axis(link) {
                    self.solve_plane(pose, skeleton, goal, iteration, link, axis, &mut states[chain_idx]);
                    continue;
                }
            }

            // 通用 3 轴求解
            let inv_link = pose.absolute(link.joint).inverse();
            let effector_vec = inv_link.transform_point(pose.absolute(self.effector).t).normalize_or_zero();
            let goal_vec = inv_link.transform_point(goal).normalize_or_zero();
            if effector_vec == Vec3::ZERO || goal_vec == Vec3::ZERO {
                continue;
            }

            let angle = effector_vec.dot(goal_vec).clamp(-1.0, 1.0).acos();
            if angle.to_degrees() < 1e-3 {
                continue;
            }
            let angle = angle.min(self.limit_angle);
            let axis = effector_vec.cross(goal_vec).normalize_or_zero();
            if axis == Vec3::ZERO {
                continue;
            }

            let mut rel = pose.relative(link.joint);
            let mut rotation = rel.q * Quat::from_axis_angle(axis, angle);

            if link.has_limits {
                let state = &mut states[chain_idx];
                let euler = decompose_rotation(Mat3::from_quat(rotation), state.prev_angle);
                let mut clamped = euler.clamp(link.limit_min, link.limit_max);
                // 增量限制
                let limit = Vec3::splat(self.limit_angle);
                clamped = (clamped - state.prev_angle).clamp(-limit, limit) + state.prev_angle;
                state.prev_angle = clamped;
                rotation = Quat::from_euler(EulerRot::XYZ, clamped.x, clamped.y, clamped.z);
            }

            rel.q = rotation.normalize();
            pose.set_relative(link.joint, rel);
            update_absolute_recursive(pose, skeleton, link.joint);
        }
    }

    /// 单轴求解
    #[allow(clippy::too_many_arguments)]
    fn solve_plane(
        &self,
        pose: &mut PoseData,
        skeleton: &DefaultSkeleton,
        goal: Vec3,
        iteration: u32,
        link: &IkLink,
        solve_axis: SolveAxis,
        state: &mut LinkState,
    ) {
        let inv_link = pose.absolute(link.joint).inverse();
        let effector_vec = inv_link.transform_point(pose.absolute(self.effector).t).normalize_or_zero();
        let goal_vec = inv_link.transform_point(goal).normalize_or_zero();
        if effector_vec == Vec3::ZERO || goal_vec == Vec3::ZERO {
            return;
        }

        let rotate_axis = solve_axis.axis();
        let angle = effector_vec
            .dot(goal_vec)
            .clamp(-1.0, 1.0)
            .acos()
            .min(self.limit_angle);

        // 测试两个方向
        let dot_pos = (Quat::from_axis_angle(rotate_axis, angle) * effector_vec).dot(goal_vec);
        let dot_neg = (Quat::from_axis_angle(rotate_axis, -angle) * effector_vec).dot(goal_vec);

        let mut new_angle = state.plane_angle + if dot_pos > dot_neg { angle } else { -angle };
        let (limit_min, limit_max) = solve_axis.limits(link);

        // 第 0 次迭代允许翻转到限制范围内
        if iteration == 0 && (new_angle < limit_min || new_angle > limit_max) {
            if -new_angle > limit_min && -new_angle < limit_max {
                new_angle = -new_angle;
            } else {
                let half = (limit_min + limit_max) * 0.5;
                if (half - new_angle).abs() > (half + new_angle).abs() {
                    new_angle = -new_angle;
                }
            }
        }

        new_angle = new_angle.clamp(limit_min, limit_max);
        state.plane_angle = new_angle;

        let mut rel = pose.relative(link.joint);
        rel.q = (state.anim_rotation * Quat::from_axis_angle(rotate_axis, new_angle)).normalize();
        pose.set_relative(link.joint, rel);
        update_absolute_recursive(pose, skeleton, link.joint);
    }
}

// ============================================================================
// 工具函数
// ============================================================================

/// 只有一个轴有限制范围时使用单轴模式
fn detect_plane_solve_axis(link: &IkLink) -> Option<SolveAxis> {
    let zero = |min: f32, max: f32| min == 0.0 && max == 0.0;
    let x_zero = zero(link.limit_min.x, link.limit_max.x);
    let y_zero = zero(link.limit_min.y, link.limit_max.y);
    let z_zero = zero(link.limit_min.z, link.limit_max.z);

    match (x_zero, y_zero, z_zero) {
        (false, true, true) => Some(SolveAxis::X),
        (true, false, true) => Some(SolveAxis::Y),
        (true, true, false) => Some(SolveAxis::Z),
        _ => None,
    }
}

/// 从旋转矩阵分解 XYZ 欧拉角，取最接近 prev 的解
fn decompose_rotation(m: Mat3, prev: Vec3) -> Vec3 {
    let sy = -m.col(0).z;

    let result = if (1.0 - sy.abs()) < 1.0e-6 {
        // 万向锁
        let ry = sy.asin();
        if prev.x.sin().abs() < prev.z.sin().abs() {
            if prev.x.cos() > 0.0 {
                Vec3::new(0.0, ry, (-m.col(1).x).asin())
            } else {
                Vec3::new(PI, ry, m.col(1).x.asin())
            }
        } else if prev.z.cos() > 0.0 {
            Vec3::new((-m.col(2).y).asin(), ry, 0.0)
        } else {
            Vec3::new(m.col(2).y.asin(), ry, PI)
        }
    } else {
        Vec3::new(
            m.col(1).z.atan2(m.col(2).z),
            (-m.col(0).z).asin(),
            m.col(0).y.atan2(m.col(0).x),
        )
    };

    closest_euler(result, prev)
}

fn closest_euler(r: Vec3, prev: Vec3) -> Vec3 {
    let mut best = r;
    let mut best_error = euler_error(r, prev);
    for sx in [PI, -PI] {
        for y in [PI - r.y, -PI - r.y] {
            for sz in [PI, -PI] {
                let candidate = Vec3::new(r.x + sx, y, r.z + sz);
                let error = euler_error(candidate, prev);
                if error < best_error {
                    best_error = error;
                    best = candidate;
                }
            }
        }
    }
    best
}

fn euler_error(a: Vec3, b: Vec3) -> f32 {
    angle_diff(a.x, b.x).abs() + angle_diff(a.y, b.y).abs() + angle_diff(a.z, b.z).abs()
}

/// 角度差（考虑周期性）
fn angle_diff(a: f32, b: f32) -> f32 {
    let diff = a.rem_euclid(2.0 * PI) - b.rem_euclid(2.0 * PI);
    if diff > PI {
        diff - 2.0 * PI
    } else if diff < -PI {
        diff + 2.0 * PI
    } else {
        diff
    }
}

/// 递归更新骨骼及其子骨骼的绝对变换
pub(crate) fn update_absolute_recursive(pose: &mut PoseData, skeleton: &DefaultSkeleton, idx: usize) {
    let parent = skeleton.parent_index(idx);
    let abs = if parent >= 0 {
        pose.absolute(parent as usize) * pose.relative(idx)
    } else {
        pose.relative(idx)
    };
    pose.set_absolute(idx, abs);

    for &child in skeleton.children(idx) {
        update_absolute_recursive(pose, skeleton, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::QuatT;
    use crate::skeleton::JointDesc;

    /// 沿 X 轴的三节手臂
    fn arm() -> DefaultSkeleton {
        DefaultSkeleton::build(&[
            JointDesc::new("shoulder", -1, QuatT::IDENTITY),
            JointDesc::new("elbow", 0, QuatT::from_translation(Vec3::X)),
            JointDesc::new("hand", 1, QuatT::from_translation(Vec3::X)),
        ])
        .unwrap()
    }

    #[test]
    fn test_ccd_reaches_goal() {
        let skel = arm();
        let mut pose = PoseData::from_default(&skel);
        let mut chain = IkChain::new(2, vec![IkLink::new(1), IkLink::new(0)]);
        chain.goal = Some(Vec3::new(1.0, 1.0, 0.0));

        let distance = chain.solve(&mut pose, &skel).unwrap();
        assert!(distance < 0.1, "distance = {distance}");
        // 解算后仍满足父子一致
        assert!(pose.validate(skel.parents(), 1.0e-4));
    }

    #[test]
    fn test_no_goal_no_change() {
        let skel = arm();
        let mut pose = PoseData::from_default(&skel);
        let before = pose.clone();
        let chain = IkChain::new(2, vec![IkLink::new(1)]);
        assert!(chain.solve(&mut pose, &skel).is_none());
        assert_eq!(pose, before);
    }

    #[test]
    fn test_plane_axis_detection() {
        let knee = IkLink::with_limits(1, Vec3::new(-PI, 0.0, 0.0), Vec3::new(-0.01, 0.0, 0.0));
        assert_eq!(detect_plane_solve_axis(&knee), Some(SolveAxis::X));
        let free = IkLink::with_limits(1, Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(detect_plane_solve_axis(&free), None);
    }
}
