//! 姿态数据
//!
//! 每个骨架实例的逐骨骼变换数组：相对变换、绝对变换、状态与可选缩放。
//! 数组长度固定等于骨骼数。

use glam::Vec3;

use crate::math::{Aabb, QuatT};

use super::default_skeleton::DefaultSkeleton;
use super::joint::JointStatus;

/// 包围盒最小半径
const MIN_BBOX_EXTENT: f32 = 0.05;

/// 姿态数据
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseData {
    relative: Vec<QuatT>,
    absolute: Vec<QuatT>,
    status: Vec<JointStatus>,
    /// 缩放（大多数骨架没有缩放轨道，首次需要时才分配）
    scale: Option<Vec<Vec3>>,
}

impl PoseData {
    /// 创建单位姿态
    pub fn new(joint_count: usize) -> Self {
        Self {
            relative: vec![QuatT::IDENTITY; joint_count],
            absolute: vec![QuatT::IDENTITY; joint_count],
            status: vec![JointStatus::empty(); joint_count],
            scale: None,
        }
    }

    /// 以绑定姿态初始化
    pub fn from_default(skeleton: &DefaultSkeleton) -> Self {
        let mut pose = Self::new(skeleton.joint_count());
        pose.reset_to_default(skeleton);
        pose
    }

    /// 重置为绑定姿态
    pub fn reset_to_default(&mut self, skeleton: &DefaultSkeleton) {
        for (i, joint) in skeleton.joints().iter().enumerate() {
            self.relative[i] = joint.default_relative;
            self.absolute[i] = joint.default_absolute;
        }
        self.status.fill(JointStatus::empty());
        if let Some(scale) = self.scale.as_mut() {
            scale.fill(Vec3::ONE);
        }
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.relative.len()
    }

    // ========================================
    // 访问
    // ========================================

    #[inline]
    pub fn relative(&self, id: usize) -> QuatT {
        self.relative[id]
    }

    #[inline]
    pub fn absolute(&self, id: usize) -> QuatT {
        self.absolute[id]
    }

    #[inline]
    pub fn status(&self, id: usize) -> JointStatus {
        self.status[id]
    }

    /// 缩放，未分配时为 1
    #[inline]
    pub fn scale(&self, id: usize) -> Vec3 {
        self.scale.as_ref().map_or(Vec3::ONE, |s| s[id])
    }

    #[inline]
    pub fn set_relative(&mut self, id: usize, value: QuatT) {
        self.relative[id] = value;
    }

    #[inline]
    pub fn set_absolute(&mut self, id: usize, value: QuatT) {
        self.absolute[id] = value;
    }

    #[inline]
    pub fn relative_slice(&self) -> &[QuatT] {
        &self.relative
    }

    #[inline]
    pub fn absolute_slice(&self) -> &[QuatT] {
        &self.absolute
    }

    #[inline]
    pub fn status_slice(&self) -> &[JointStatus] {
        &self.status
    }

    #[inline]
    pub fn scale_slice(&self) -> Option<&[Vec3]> {
        self.scale.as_deref()
    }

    #[inline]
    pub fn is_scaling_present(&self) -> bool {
        self.scale.is_some()
    }

    /// 缩放缓冲区，首次调用时分配并填充 1
    pub fn ensure_scale(&mut self) -> &mut Vec<Vec3> {
        let count = self.relative.len();
        self.scale.get_or_insert_with(|| vec![Vec3::ONE; count])
    }

    /// 同时可变借用相对变换、状态与缩放
    pub(crate) fn channels_mut(
        &mut self,
    ) -> (&mut [QuatT], &mut [JointStatus], Option<&mut Vec<Vec3>>) {
        (&mut self.relative, &mut self.status, self.scale.as_mut())
    }

    pub(crate) fn relative_and_absolute_mut(&mut self) -> (&mut [QuatT], &mut [QuatT]) {
        (&mut self.relative, &mut self.absolute)
    }

    pub fn clear_status(&mut self) {
        self.status.fill(JointStatus::empty());
    }

    /// 拷贝另一个姿态的全部内容（长度相同）
    pub fn copy_from(&mut self, other: &PoseData) {
        self.relative.copy_from_slice(&other.relative);
        self.absolute.copy_from_slice(&other.absolute);
        self.status.copy_from_slice(&other.status);
        match (&mut self.scale, &other.scale) {
            (Some(dst), Some(src)) => dst.copy_from_slice(src),
            (dst, Some(src)) => *dst = Some(src.clone()),
            (Some(dst), None) => dst.fill(Vec3::ONE),
            (None, None) => {}
        }
    }

    // ========================================
    // 绝对姿态
    // ========================================

    /// absolute[j] = absolute[parent] * relative[j]
    pub fn compute_absolute_pose(&mut self, parents: &[i32]) {
        if self.relative.is_empty() {
            return;
        }
        self.absolute[0] = self.relative[0];
        for i in 1..self.relative.len() {
            let parent = parents[i];
            self.absolute[i] = if parent >= 0 {
                self.absolute[parent as usize] * self.relative[i]
            } else {
                self.relative[i]
            };
        }
    }

    /// 只重新计算给定骨骼（要求按索引升序，即父先于子）
    pub fn compute_absolute_for(&mut self, joints: &[usize], parents: &[i32]) {
        for &i in joints {
            let parent = parents[i];
            self.absolute[i] = if parent >= 0 {
                self.absolute[parent as usize] * self.relative[i]
            } else {
                self.relative[i]
            };
        }
    }

    /// 由绝对变换反推相对变换
    pub fn compute_relative_pose(&mut self, parents: &[i32]) {
        for i in 0..self.absolute.len() {
            let parent = parents[i];
            self.relative[i] = if parent >= 0 {
                self.absolute[parent as usize].inverse() * self.absolute[i]
            } else {
                self.absolute[i]
            };
        }
    }

    // ========================================
    // 校验
    // ========================================

    /// 所有四元数为单位长度，且绝对变换与父子关系一致
    pub fn validate(&self, parents: &[i32], epsilon: f32) -> bool {
        for i in 0..self.relative.len() {
            if !self.relative[i].is_valid() || !self.absolute[i].is_valid() {
                log::error!("[PoseData] 骨骼 {} 变换无效: {:?}", i, self.relative[i]);
                return false;
            }
            let parent = parents[i];
            if parent >= 0 {
                let expected = self.absolute[parent as usize] * self.relative[i];
                if !expected.is_equivalent(&self.absolute[i], epsilon) {
                    log::error!("[PoseData] 骨骼 {} 绝对变换与父骨骼不一致", i);
                    return false;
                }
            }
        }
        true
    }

    /// 模型空间包围盒
    pub fn compute_bounding_box(&self) -> Aabb {
        let mut bbox = Aabb::EMPTY;
        for abs in &self.absolute {
            bbox.add_point(abs.t);
        }
        bbox.ensure_min_extent(MIN_BBOX_EXTENT);
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::JointDesc;
    use glam::Quat;

    fn skeleton() -> DefaultSkeleton {
        DefaultSkeleton::build(&[
            JointDesc::new("root", -1, QuatT::IDENTITY),
            JointDesc::new("a", 0, QuatT::new(Quat::from_rotation_z(0.5), Vec3::X)),
            JointDesc::new("b", 1, QuatT::from_translation(Vec3::X)),
        ])
        .unwrap()
    }

    #[test]
    fn test_absolute_matches_parent_chain() {
        let skel = skeleton();
        let mut pose = PoseData::from_default(&skel);
        pose.set_relative(1, QuatT::new(Quat::from_rotation_y(1.0), Vec3::X));
        pose.compute_absolute_pose(skel.parents());
        assert!(pose.validate(skel.parents(), 1.0e-5));
        let expected = pose.absolute(1) * pose.relative(2);
        assert!(pose.absolute(2).is_equivalent(&expected, 1.0e-6));
    }

    #[test]
    fn test_scale_lazy() {
        let skel = skeleton();
        let mut pose = PoseData::from_default(&skel);
        assert!(!pose.is_scaling_present());
        assert_eq!(pose.scale(1), Vec3::ONE);
        pose.ensure_scale()[1] = Vec3::splat(2.0);
        assert!(pose.is_scaling_present());
        assert_eq!(pose.scale(1), Vec3::splat(2.0));
    }

    #[test]
    fn test_relative_roundtrip() {
        let skel = skeleton();
        let mut pose = PoseData::from_default(&skel);
        let before = pose.relative(2);
        pose.compute_relative_pose(skel.parents());
        assert!(pose.relative(2).is_equivalent(&before, 1.0e-5));
    }
}
