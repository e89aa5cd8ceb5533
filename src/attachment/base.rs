//! 挂点公共数据：名称、类型、标志与绑定对象

use crate::error::{AnimError, Result};
use crate::math::crc32_lowercase;

use super::flags::AttachmentFlags;
use super::object::AttachmentObject;
use super::simulation::SimulationContext;

/// 挂点类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    Bone,
    Face,
    Skin,
    /// 碰撞代理（由代理列表单独管理）
    Proxy,
    PendulumRow,
    VCloth,
}

impl AttachmentType {
    /// 定义文件中的类型名
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "CA_BONE" => Some(AttachmentType::Bone),
            "CA_FACE" => Some(AttachmentType::Face),
            "CA_SKIN" => Some(AttachmentType::Skin),
            "CA_PROX" => Some(AttachmentType::Proxy),
            "CA_PROW" => Some(AttachmentType::PendulumRow),
            "CA_VCLOTH" => Some(AttachmentType::VCloth),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            AttachmentType::Bone => "CA_BONE",
            AttachmentType::Face => "CA_FACE",
            AttachmentType::Skin => "CA_SKIN",
            AttachmentType::Proxy => "CA_PROX",
            AttachmentType::PendulumRow => "CA_PROW",
            AttachmentType::VCloth => "CA_VCLOTH",
        }
    }

    /// 是否需要骨骼名
    #[inline]
    pub fn requires_joint(self) -> bool {
        matches!(self, AttachmentType::Bone | AttachmentType::PendulumRow)
    }
}

/// 所有挂点共有的数据
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentBase {
    /// 小写名称
    name: String,
    name_crc: u32,
    pub(crate) flags: AttachmentFlags,
    pub(crate) object: Option<AttachmentObject>,
}

impl AttachmentBase {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(AnimError::InvalidAttribute {
                name: "AName".to_string(),
                value: String::new(),
            });
        }
        let name = name.to_lowercase();
        Ok(Self {
            name_crc: crc32_lowercase(&name),
            name,
            flags: AttachmentFlags::empty(),
            object: None,
        })
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
    pub fn flags(&self) -> AttachmentFlags {
        self.flags
    }

    #[inline]
    pub fn object(&self) -> Option<&AttachmentObject> {
        self.object.as_ref()
    }

    /// 三个渲染通道一起隐藏或显示
    pub fn hide_attachment(&mut self, hide: bool) {
        self.flags.set(AttachmentFlags::HIDE_ALL_PASSES, hide);
    }

    pub fn hide_in_shadow(&mut self, hide: bool) {
        self.flags.set(AttachmentFlags::HIDE_SHADOW_PASS, hide);
    }

    pub fn hide_in_recursion(&mut self, hide: bool) {
        self.flags.set(AttachmentFlags::HIDE_RECURSION, hide);
    }

    #[inline]
    pub fn is_attachment_hidden(&self) -> bool {
        self.flags.contains(AttachmentFlags::HIDE_MAIN_PASS)
    }

    /// 定义文件中的标志，保留运行时标志
    pub(crate) fn set_definition_flags(&mut self, flags: AttachmentFlags) {
        let runtime = AttachmentFlags::PROJECTED | AttachmentFlags::VISIBLE;
        self.flags = (self.flags & runtime) | (flags - runtime);
    }
}

/// 距离剔除：`缩放后距离² <= (半径 * 比率)²` 时可见，半径未知视为可见
pub(crate) fn within_view_distance(radius: f32, sim: &SimulationContext<'_>) -> bool {
    if radius <= 0.0 {
        return true;
    }
    let zoom = sim.frame.zoom_factor * sim.frame.zoom_factor;
    let scaled = sim.frame.zoom_distance_sq / zoom.max(1.0e-6);
    let limit = radius * sim.config.attachment_culling_ratio;
    scaled <= limit * limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        for ty in [
            AttachmentType::Bone,
            AttachmentType::Face,
            AttachmentType::Skin,
            AttachmentType::Proxy,
            AttachmentType::PendulumRow,
            AttachmentType::VCloth,
        ] {
            assert_eq!(AttachmentType::from_type_name(ty.type_name()), Some(ty));
        }
        assert_eq!(AttachmentType::from_type_name("CA_SOCKET"), None);
    }

    #[test]
    fn test_hide_flags() {
        let mut base = AttachmentBase::new("Hat").unwrap();
        assert_eq!(base.name(), "hat");
        base.hide_attachment(true);
        assert!(base.is_attachment_hidden());
        assert!(base.flags().contains(AttachmentFlags::HIDE_SHADOW_PASS));
        base.hide_in_shadow(false);
        assert!(base.is_attachment_hidden());
        assert!(!base.flags().contains(AttachmentFlags::HIDE_SHADOW_PASS));
        base.hide_attachment(false);
        assert!(!base.is_attachment_hidden());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(AttachmentBase::new("").is_err());
    }
}
