//! 蒙皮挂点
//!
//! 蒙皮网格使用自己的骨骼列表，绑定时按名称映射到角色骨架。
//! 每帧输出蒙皮变换 `absolute(j) * inverse(default_absolute(j))`。

use crate::math::{crc32_lowercase, QuatT};
use crate::skeleton::{DefaultSkeleton, PoseData};

use super::base::AttachmentBase;
use super::object::AttachmentObject;

/// 蒙皮网格到骨架的映射
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinBinding {
    mesh_name: String,
    /// 网格骨骼索引 -> 骨架骨骼索引，无法解析为 -1
    remap: Vec<i32>,
    skinning: Vec<QuatT>,
}

impl SkinBinding {
    /// 按骨骼名 CRC 建立映射；无法解析的骨骼记录错误并映射为 -1
    pub fn new(mesh_name: &str, joint_names: &[String], skeleton: &DefaultSkeleton) -> Self {
        let remap: Vec<i32> = joint_names
            .iter()
            .map(|name| {
                let id = skeleton.joint_id_by_crc(crc32_lowercase(name));
                if id < 0 {
                    log::error!("[Attachment] 蒙皮 '{}' 的骨骼 '{}' 在骨架中不存在", mesh_name, name);
                }
                id
            })
            .collect();
        Self {
            mesh_name: mesh_name.to_string(),
            skinning: vec![QuatT::IDENTITY; remap.len()],
            remap,
        }
    }

    #[inline]
    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    #[inline]
    pub fn remap(&self) -> &[i32] {
        &self.remap
    }

    /// 本帧蒙皮变换（按网格骨骼顺序）
    #[inline]
    pub fn skinning(&self) -> &[QuatT] {
        &self.skinning
    }

    /// 全部骨骼都能解析
    pub fn is_complete(&self) -> bool {
        self.remap.iter().all(|&id| id >= 0)
    }

    pub(crate) fn update(&mut self, pose: &PoseData, skeleton: &DefaultSkeleton) {
        for (out, &id) in self.skinning.iter_mut().zip(&self.remap) {
            *out = if id >= 0 && (id as usize) < pose.joint_count() {
                let j = id as usize;
                pose.absolute(j) * skeleton.default_absolute(j).inverse()
            } else {
                QuatT::IDENTITY
            };
        }
    }
}

/// 蒙皮挂点
#[derive(Clone, Debug)]
pub struct SkinAttachment {
    pub(crate) base: AttachmentBase,
    pub(crate) binding: Option<SkinBinding>,
}

impl SkinAttachment {
    pub(crate) fn new(base: AttachmentBase) -> Self {
        Self { base, binding: None }
    }

    #[inline]
    pub fn binding(&self) -> Option<&SkinBinding> {
        self.binding.as_ref()
    }

    /// 绑定蒙皮网格；非蒙皮对象返回 false
    pub(crate) fn bind(&mut self, object: AttachmentObject, skeleton: &DefaultSkeleton) -> bool {
        let AttachmentObject::SkinMesh { name, joint_names } = &object else {
            log::error!("[Attachment] 蒙皮挂点 '{}' 只能绑定蒙皮网格", self.base.name());
            return false;
        };
        self.binding = Some(SkinBinding::new(name, joint_names, skeleton));
        self.base.object = Some(object);
        true
    }

    pub(crate) fn unbind(&mut self) {
        self.binding = None;
        self.base.object = None;
    }

    pub(crate) fn update_skinning(&mut self, pose: &PoseData, skeleton: &DefaultSkeleton) {
        if let Some(binding) = self.binding.as_mut() {
            binding.update(pose, skeleton);
        }
    }
}
