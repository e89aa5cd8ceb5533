//! 集成测试共用的骨架与角色

#![allow(dead_code)]

use std::sync::Arc;

use character_anim::attachment::{AttachmentObject, BindingKind, BindingResolver, CharacterAttachmentDesc};
use character_anim::{AnimationConfig, AnimationSet, CharacterInstance, DefaultSkeleton, JointDesc, QuatT};
use glam::Vec3;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// root -> spine -> head，每节沿 Z 轴 1 米
pub fn humanoid() -> Arc<DefaultSkeleton> {
    Arc::new(
        DefaultSkeleton::build(&[
            JointDesc::new("root", -1, QuatT::IDENTITY),
            JointDesc::new("spine", 0, QuatT::from_translation(Vec3::Z)),
            JointDesc::new("head", 1, QuatT::from_translation(Vec3::Z)),
        ])
        .expect("skeleton"),
    )
}

pub fn character_with(set: AnimationSet, config: AnimationConfig) -> CharacterInstance {
    let skeleton = Arc::clone(set.skeleton());
    CharacterInstance::new("hero", skeleton, Arc::new(set), config).expect("character")
}

pub fn character() -> CharacterInstance {
    character_with(AnimationSet::new(humanoid()), AnimationConfig::default())
}

/// 把 .cgf 绑定解析为半径 0.2 的静态几何体
pub struct StaticResolver;

impl BindingResolver for StaticResolver {
    fn resolve(&mut self, desc: &CharacterAttachmentDesc) -> Option<AttachmentObject> {
        match desc.binding_kind() {
            BindingKind::StaticGeometry => Some(AttachmentObject::StatObj {
                name: desc.binding_path.clone(),
                radius: 0.2,
            }),
            _ => None,
        }
    }
}
