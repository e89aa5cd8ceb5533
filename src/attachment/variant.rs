//! 挂点变体

use crate::math::{QuatT, QuatTS};
use crate::skeleton::DefaultSkeleton;

use super::base::{AttachmentBase, AttachmentType};
use super::bone::BoneAttachment;
use super::face::FaceAttachment;
use super::flags::AttachmentFlags;
use super::object::AttachmentObject;
use super::row::PendulumRowAttachment;
use super::skin::SkinAttachment;
use super::vcloth::VClothAttachment;

/// 挂点
#[derive(Clone, Debug)]
pub enum Attachment {
    Bone(BoneAttachment),
    Face(FaceAttachment),
    Skin(SkinAttachment),
    VCloth(VClothAttachment),
    PendulumRow(PendulumRowAttachment),
}

impl Attachment {
    #[inline]
    pub(crate) fn base(&self) -> &AttachmentBase {
        match self {
            Attachment::Bone(a) => &a.base,
            Attachment::Face(a) => &a.base,
            Attachment::Skin(a) => &a.base,
            Attachment::VCloth(a) => &a.base,
            Attachment::PendulumRow(a) => &a.base,
        }
    }

    #[inline]
    pub(crate) fn base_mut(&mut self) -> &mut AttachmentBase {
        match self {
            Attachment::Bone(a) => &mut a.base,
            Attachment::Face(a) => &mut a.base,
            Attachment::Skin(a) => &mut a.base,
            Attachment::VCloth(a) => &mut a.base,
            Attachment::PendulumRow(a) => &mut a.base,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.base().name()
    }

    #[inline]
    pub fn name_crc(&self) -> u32 {
        self.base().name_crc()
    }

    pub fn attachment_type(&self) -> AttachmentType {
        match self {
            Attachment::Bone(_) => AttachmentType::Bone,
            Attachment::Face(_) => AttachmentType::Face,
            Attachment::Skin(_) => AttachmentType::Skin,
            Attachment::VCloth(_) => AttachmentType::VCloth,
            Attachment::PendulumRow(_) => AttachmentType::PendulumRow,
        }
    }

    #[inline]
    pub fn flags(&self) -> AttachmentFlags {
        self.base().flags()
    }

    /// 设置定义文件中的标志（PROJECTED 与 VISIBLE 由运行时维护）
    pub fn set_flags(&mut self, flags: AttachmentFlags) {
        self.base_mut().set_definition_flags(flags);
    }

    #[inline]
    pub fn object(&self) -> Option<&AttachmentObject> {
        self.base().object()
    }

    pub fn hide_attachment(&mut self, hide: bool) {
        self.base_mut().hide_attachment(hide);
    }

    pub fn hide_in_shadow(&mut self, hide: bool) {
        self.base_mut().hide_in_shadow(hide);
    }

    pub fn hide_in_recursion(&mut self, hide: bool) {
        self.base_mut().hide_in_recursion(hide);
    }

    #[inline]
    pub fn is_attachment_hidden(&self) -> bool {
        self.base().is_attachment_hidden()
    }

    /// 骨骼索引；不依附骨骼或无法解析时为 -1
    pub fn joint_id(&self) -> i32 {
        match self {
            Attachment::Bone(a) => a.joint_id(),
            Attachment::PendulumRow(a) => a.joint_id(),
            _ => -1,
        }
    }

    /// 动画驱动的模型空间变换
    pub fn model_relative(&self) -> QuatT {
        match self {
            Attachment::Bone(a) => a.model_relative(),
            Attachment::Face(a) => a.model_relative(),
            _ => QuatT::IDENTITY,
        }
    }

    /// 次级运动附加变换
    pub fn add_transformation(&self) -> QuatT {
        match self {
            Attachment::Bone(a) => a.add_transformation(),
            Attachment::Face(a) => a.add_transformation(),
            _ => QuatT::IDENTITY,
        }
    }

    /// 世界变换：`location * model_relative * add`
    pub fn world_transform(&self, location: &QuatTS) -> QuatTS {
        *location * (self.model_relative() * self.add_transformation())
    }

    /// 重新投影；不需要投影的类型直接返回 true
    pub fn project_attachment(&mut self, skeleton: &DefaultSkeleton) -> bool {
        match self {
            Attachment::Bone(a) => a.project_attachment(skeleton),
            Attachment::Face(a) => a.project_attachment(),
            _ => true,
        }
    }

    #[inline]
    pub fn as_bone(&self) -> Option<&BoneAttachment> {
        match self {
            Attachment::Bone(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bone_mut(&mut self) -> Option<&mut BoneAttachment> {
        match self {
            Attachment::Bone(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_face(&self) -> Option<&FaceAttachment> {
        match self {
            Attachment::Face(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_face_mut(&mut self) -> Option<&mut FaceAttachment> {
        match self {
            Attachment::Face(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_skin(&self) -> Option<&SkinAttachment> {
        match self {
            Attachment::Skin(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vcloth(&self) -> Option<&VClothAttachment> {
        match self {
            Attachment::VCloth(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vcloth_mut(&mut self) -> Option<&mut VClothAttachment> {
        match self {
            Attachment::VCloth(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_pendulum_row(&self) -> Option<&PendulumRowAttachment> {
        match self {
            Attachment::PendulumRow(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_pendulum_row_mut(&mut self) -> Option<&mut PendulumRowAttachment> {
        match self {
            Attachment::PendulumRow(a) => Some(a),
            _ => None,
        }
    }

    /// 绑定对象；类型不匹配时返回 false
    pub(crate) fn bind(&mut self, object: AttachmentObject, skeleton: &DefaultSkeleton) -> bool {
        match self {
            Attachment::Skin(a) => a.bind(object, skeleton),
            Attachment::VCloth(a) => a.bind(object, skeleton),
            Attachment::PendulumRow(a) => {
                log::warn!("[Attachment] 骨骼链挂点 '{}' 不能绑定对象", a.base.name());
                false
            }
            Attachment::Bone(a) => {
                a.base.object = Some(object);
                true
            }
            Attachment::Face(a) => {
                a.base.object = Some(object);
                true
            }
        }
    }

    /// 解除绑定，返回原对象
    pub(crate) fn unbind(&mut self) -> Option<AttachmentObject> {
        let object = self.base_mut().object.take();
        match self {
            Attachment::Skin(a) => a.unbind(),
            Attachment::VCloth(a) => a.unbind(),
            Attachment::Bone(a) => {
                a.base.flags.remove(AttachmentFlags::VISIBLE);
                a.simulation.reset();
            }
            Attachment::Face(a) => {
                a.base.flags.remove(AttachmentFlags::VISIBLE);
                a.simulation.reset();
            }
            Attachment::PendulumRow(_) => {}
        }
        object
    }
}
