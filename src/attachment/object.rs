//! 挂点绑定的对象
//!
//! 渲染资源本身不在本模块管理，这里只记录对象种类与调度需要的少量信息。

use crate::character::CharacterId;

/// 绑定对象
#[derive(Clone, Debug, PartialEq)]
pub enum AttachmentObject {
    /// 静态几何体
    StatObj { name: String, radius: f32 },
    /// 带骨架的子角色（句柄指向角色池）
    Skeleton(CharacterId),
    /// 游戏实体
    Entity { id: u32 },
    /// 光源
    Light { radius: f32 },
    /// 粒子特效
    Effect { name: String },
    /// 蒙皮网格，记录网格使用的骨骼名称
    SkinMesh { name: String, joint_names: Vec<String> },
}

/// 绑定对象种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    StatObj,
    Skeleton,
    Entity,
    Light,
    Effect,
    SkinMesh,
}

impl AttachmentObject {
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        match self {
            AttachmentObject::StatObj { .. } => ObjectKind::StatObj,
            AttachmentObject::Skeleton(_) => ObjectKind::Skeleton,
            AttachmentObject::Entity { .. } => ObjectKind::Entity,
            AttachmentObject::Light { .. } => ObjectKind::Light,
            AttachmentObject::Effect { .. } => ObjectKind::Effect,
            AttachmentObject::SkinMesh { .. } => ObjectKind::SkinMesh,
        }
    }

    /// 包围半径，未知时为 0
    pub fn radius(&self) -> f32 {
        match self {
            AttachmentObject::StatObj { radius, .. } | AttachmentObject::Light { radius } => *radius,
            _ => 0.0,
        }
    }

    /// 子角色句柄
    #[inline]
    pub fn character(&self) -> Option<CharacterId> {
        match self {
            AttachmentObject::Skeleton(id) => Some(*id),
            _ => None,
        }
    }
}

/// 绑定文件种类，按扩展名判断
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// .cdf / .cga / .chr / .skel：子角色
    Character,
    /// .cgf：静态几何体
    StaticGeometry,
    /// .skin：蒙皮网格
    Skin,
    Unknown,
}

impl BindingKind {
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("cdf" | "cga" | "chr" | "skel") => BindingKind::Character,
            Some("cgf") => BindingKind::StaticGeometry,
            Some("skin") => BindingKind::Skin,
            _ => BindingKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_kind_by_extension() {
        assert_eq!(BindingKind::from_path("objects/hat.CGF"), BindingKind::StaticGeometry);
        assert_eq!(BindingKind::from_path("chars/rifle.cdf"), BindingKind::Character);
        assert_eq!(BindingKind::from_path("chars/body.skin"), BindingKind::Skin);
        assert_eq!(BindingKind::from_path("noext"), BindingKind::Unknown);
    }

    #[test]
    fn test_object_radius() {
        let obj = AttachmentObject::StatObj {
            name: "hat".into(),
            radius: 0.3,
        };
        assert_eq!(obj.radius(), 0.3);
        assert_eq!(obj.kind(), ObjectKind::StatObj);
        assert_eq!(AttachmentObject::Entity { id: 3 }.radius(), 0.0);
    }
}
