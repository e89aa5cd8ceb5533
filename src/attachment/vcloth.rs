//! 顶点布料挂点
//!
//! 布料求解不在本库范围内。这里保存渲染网格与模拟网格两份蒙皮映射，
//! 以及布料参数，供外部求解器读取。

use crate::skeleton::{DefaultSkeleton, PoseData};

use super::base::AttachmentBase;
use super::flags::AttachmentFlags;
use super::object::AttachmentObject;
use super::skin::SkinBinding;

/// 布料参数
#[derive(Clone, Debug, PartialEq)]
pub struct VClothParams {
    pub hide: bool,
    pub force_skinning: bool,
    pub force_skinning_fps_threshold: f32,
    pub disable_simulation_at_distance: f32,
    pub time_step: f32,
    pub time_steps_max: u32,
    pub num_iterations: u32,
    pub gravity_factor: f32,
    pub stretch_stiffness: f32,
    pub shear_stiffness: f32,
    pub bend_stiffness: f32,
    pub pull_stiffness: f32,
    pub friction: f32,
    pub rigid_damping: f32,
    pub spring_damping: f32,
    pub translation_blend: f32,
    pub rotation_blend: f32,
    pub max_anim_distance: f32,
    /// 渲染网格（.skin）
    pub render_binding: String,
    /// 模拟网格（.skin）
    pub sim_binding: String,
    pub material: String,
}

impl Default for VClothParams {
    fn default() -> Self {
        Self {
            hide: false,
            force_skinning: false,
            force_skinning_fps_threshold: 25.0,
            disable_simulation_at_distance: 10.0,
            time_step: 1.0 / 80.0,
            time_steps_max: 9,
            num_iterations: 5,
            gravity_factor: 1.0,
            stretch_stiffness: 1.0,
            shear_stiffness: 0.0,
            bend_stiffness: 0.0,
            pull_stiffness: 0.0,
            friction: 0.1,
            rigid_damping: 0.0,
            spring_damping: 0.0,
            translation_blend: 0.0,
            rotation_blend: 0.0,
            max_anim_distance: 0.0,
            render_binding: String::new(),
            sim_binding: String::new(),
            material: String::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VClothAttachment {
    pub(crate) base: AttachmentBase,
    pub params: VClothParams,
    pub(crate) render: Option<SkinBinding>,
    pub(crate) simulation_mesh: Option<SkinBinding>,
}

impl VClothAttachment {
    pub(crate) fn new(base: AttachmentBase) -> Self {
        Self {
            base,
            params: VClothParams::default(),
            render: None,
            simulation_mesh: None,
        }
    }

    #[inline]
    pub fn render_binding(&self) -> Option<&SkinBinding> {
        self.render.as_ref()
    }

    #[inline]
    pub fn simulation_binding(&self) -> Option<&SkinBinding> {
        self.simulation_mesh.as_ref()
    }

    /// 绑定渲染网格，启用软件蒙皮
    pub(crate) fn bind(&mut self, object: AttachmentObject, skeleton: &DefaultSkeleton) -> bool {
        let AttachmentObject::SkinMesh { name, joint_names } = &object else {
            log::error!("[Attachment] 布料挂点 '{}' 的渲染网格必须是蒙皮网格", self.base.name());
            return false;
        };
        self.render = Some(SkinBinding::new(name, joint_names, skeleton));
        self.base.object = Some(object);
        self.base.flags.insert(AttachmentFlags::SW_SKINNING);
        true
    }

    /// 绑定模拟网格
    pub(crate) fn add_sim_binding(&mut self, object: &AttachmentObject, skeleton: &DefaultSkeleton) -> bool {
        let AttachmentObject::SkinMesh { name, joint_names } = object else {
            log::error!("[Attachment] 布料挂点 '{}' 的模拟网格必须是蒙皮网格", self.base.name());
            return false;
        };
        self.simulation_mesh = Some(SkinBinding::new(name, joint_names, skeleton));
        true
    }

    pub(crate) fn unbind(&mut self) {
        self.render = None;
        self.simulation_mesh = None;
        self.base.object = None;
    }

    pub(crate) fn update_skinning(&mut self, pose: &PoseData, skeleton: &DefaultSkeleton) {
        if let Some(render) = self.render.as_mut() {
            render.update(pose, skeleton);
        }
        if let Some(sim) = self.simulation_mesh.as_mut() {
            sim.update(pose, skeleton);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::QuatT;
    use crate::skeleton::JointDesc;

    #[test]
    fn test_bind_sets_sw_skinning() {
        let skel = DefaultSkeleton::build(&[JointDesc::new("root", -1, QuatT::IDENTITY)]).unwrap();
        let mut cloth = VClothAttachment::new(AttachmentBase::new("cape").unwrap());
        let mesh = AttachmentObject::SkinMesh {
            name: "cape.skin".into(),
            joint_names: vec!["root".into()],
        };
        assert!(cloth.bind(mesh.clone(), &skel));
        assert!(cloth.add_sim_binding(&mesh, &skel));
        assert!(cloth.base.flags().contains(AttachmentFlags::SW_SKINNING));
        assert!(cloth.simulation_binding().is_some());
    }
}
