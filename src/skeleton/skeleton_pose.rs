//! 骨架实例姿态
//!
//! 每个角色持有两份 PoseData：当前姿态与绑定姿态（回退用）。
//! 同一帧只有当前姿态可写，写入结束后关闭可写标记。

use std::sync::Arc;

use crate::math::{Aabb, QuatT};

use super::default_skeleton::DefaultSkeleton;
use super::pose_data::PoseData;

/// 骨架实例姿态
#[derive(Clone, Debug)]
pub struct SkeletonPose {
    skeleton: Arc<DefaultSkeleton>,
    pose: PoseData,
    default_pose: PoseData,
    writeable: bool,
    bbox: Aabb,
}

impl SkeletonPose {
    pub fn new(skeleton: Arc<DefaultSkeleton>) -> Self {
        let default_pose = PoseData::from_default(&skeleton);
        let pose = default_pose.clone();
        let bbox = pose.compute_bounding_box();
        Self {
            skeleton,
            pose,
            default_pose,
            writeable: false,
            bbox,
        }
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<DefaultSkeleton> {
        &self.skeleton
    }

    /// 当前姿态（只读）
    #[inline]
    pub fn pose(&self) -> &PoseData {
        &self.pose
    }

    /// 绑定姿态
    #[inline]
    pub fn default_pose(&self) -> &PoseData {
        &self.default_pose
    }

    /// 开始本帧写入
    pub fn begin_writing(&mut self) {
        debug_assert!(!self.writeable, "上一帧的姿态写入尚未结束");
        self.writeable = true;
    }

    /// 本帧可写目标，写入结束后为 None
    pub fn writeable_pose(&mut self) -> Option<&mut PoseData> {
        if self.writeable {
            Some(&mut self.pose)
        } else {
            None
        }
    }

    /// 结束本帧写入并更新包围盒
    pub fn finish_writing(&mut self) {
        self.writeable = false;
        self.bbox = self.pose.compute_bounding_box();
    }

    #[inline]
    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    /// 写入期间同时访问可写姿态与绑定姿态
    pub(crate) fn split_for_execute(&mut self) -> Option<(&mut PoseData, &PoseData)> {
        if self.writeable {
            Some((&mut self.pose, &self.default_pose))
        } else {
            None
        }
    }

    // ========================================
    // 查询
    // ========================================

    #[inline]
    pub fn joint_relative(&self, id: usize) -> Option<QuatT> {
        (id < self.pose.joint_count()).then(|| self.pose.relative(id))
    }

    #[inline]
    pub fn joint_absolute(&self, id: usize) -> Option<QuatT> {
        (id < self.pose.joint_count()).then(|| self.pose.absolute(id))
    }

    /// 模型空间包围盒
    #[inline]
    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    pub(crate) fn set_bounding_box(&mut self, bbox: Aabb) {
        self.bbox = bbox;
    }

    /// 重置为绑定姿态
    pub fn reset_to_default(&mut self) {
        self.pose.copy_from(&self.default_pose);
        self.bbox = self.pose.compute_bounding_box();
    }
}
