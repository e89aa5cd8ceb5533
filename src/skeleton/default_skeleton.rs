//! 默认骨架
//!
//! 所有实例共享的骨骼层次、名称查找表与绑定姿态。

use crate::error::{AnimError, Result};
use crate::math::{crc32_lowercase, QuatT};

use super::joint::{Joint, JointDesc};

/// 默认骨架（实例间共享，只读）
#[derive(Clone, Debug)]
pub struct DefaultSkeleton {
    joints: Vec<Joint>,
    /// 父索引数组，供洪泛填充与绝对姿态计算使用
    parents: Vec<i32>,
    /// 子骨骼缓存
    children: Vec<Vec<usize>>,
}

impl DefaultSkeleton {
    /// 从骨骼描述构建骨架
    ///
    /// 要求：至少一个骨骼，骨骼 0 为根，其余骨骼的父索引小于自身索引。
    pub fn build(descs: &[JointDesc]) -> Result<Self> {
        if descs.is_empty() {
            return Err(AnimError::Skeleton("骨架为空".to_string()));
        }
        if descs[0].parent >= 0 {
            return Err(AnimError::Skeleton(format!(
                "骨骼 0 ({}) 必须是根骨骼",
                descs[0].name
            )));
        }

        let mut joints: Vec<Joint> = descs.iter().map(Joint::from_desc).collect();
        let mut children = vec![Vec::new(); joints.len()];

        for i in 1..joints.len() {
            let parent = joints[i].parent;
            if parent < 0 || parent as usize >= i {
                return Err(AnimError::Skeleton(format!(
                    "骨骼 {} ({}) 的父索引 {} 非法",
                    i, joints[i].name, parent
                )));
            }
            children[parent as usize].push(i);
        }

        // 父先于子，顺序遍历即可
        joints[0].default_absolute = joints[0].default_relative;
        for i in 1..joints.len() {
            let parent_abs = joints[joints[i].parent as usize].default_absolute;
            joints[i].default_absolute = parent_abs * joints[i].default_relative;
        }

        let parents = joints.iter().map(|j| j.parent).collect();
        log::info!("[Skeleton] 骨架构建完成: {} 个骨骼", joints.len());

        Ok(Self {
            joints,
            parents,
            children,
        })
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[inline]
    pub fn joint(&self, id: usize) -> Option<&Joint> {
        self.joints.get(id)
    }

    #[inline]
    pub fn parents(&self) -> &[i32] {
        &self.parents
    }

    #[inline]
    pub fn parent_index(&self, id: usize) -> i32 {
        self.parents.get(id).copied().unwrap_or(-1)
    }

    #[inline]
    pub fn children(&self, id: usize) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn children_cache(&self) -> &[Vec<usize>] {
        &self.children
    }

    /// 按名称查找（忽略大小写），找不到返回 -1
    pub fn joint_id_by_name(&self, name: &str) -> i32 {
        if name.is_empty() {
            return -1;
        }
        self.joint_id_by_crc(crc32_lowercase(name))
    }

    /// 按小写名称 CRC 查找，找不到返回 -1
    pub fn joint_id_by_crc(&self, crc: u32) -> i32 {
        self.joints
            .iter()
            .position(|j| j.name_crc == crc)
            .map_or(-1, |i| i as i32)
    }

    pub fn joint_name(&self, id: usize) -> Option<&str> {
        self.joints.get(id).map(|j| j.name.as_str())
    }

    #[inline]
    pub fn default_relative(&self, id: usize) -> QuatT {
        self.joints.get(id).map_or(QuatT::IDENTITY, |j| j.default_relative)
    }

    #[inline]
    pub fn default_absolute(&self, id: usize) -> QuatT {
        self.joints.get(id).map_or(QuatT::IDENTITY, |j| j.default_absolute)
    }
}
