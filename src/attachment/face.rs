//! 面挂点
//!
//! 挂点跟随网格上的一个三角面。三角面的坐标系由外部（蒙皮结果）提供：
//! 绑定姿态下的面坐标系用于投影，每帧的面坐标系用于更新。

use crate::math::{QuatT, QuatTS};
use crate::skeleton::PoseData;

use super::base::{within_view_distance, AttachmentBase};
use super::flags::AttachmentFlags;
use super::proxy::Proxy;
use super::simulation::{Simulation, SimulationContext};

#[derive(Clone, Debug)]
pub struct FaceAttachment {
    pub(crate) base: AttachmentBase,
    absolute_default: QuatT,
    relative_default: QuatT,
    /// 绑定姿态下的面坐标系
    default_face_frame: QuatT,
    /// 本帧面坐标系
    face_frame: QuatT,
    model_relative: QuatT,
    add_transformation: QuatT,
    pub(crate) simulation: Simulation,
}

impl FaceAttachment {
    pub(crate) fn new(base: AttachmentBase) -> Self {
        Self {
            base,
            absolute_default: QuatT::IDENTITY,
            relative_default: QuatT::IDENTITY,
            default_face_frame: QuatT::IDENTITY,
            face_frame: QuatT::IDENTITY,
            model_relative: QuatT::IDENTITY,
            add_transformation: QuatT::IDENTITY,
            simulation: Simulation::default(),
        }
    }

    #[inline]
    pub fn absolute_default(&self) -> QuatT {
        self.absolute_default
    }

    #[inline]
    pub fn relative_default(&self) -> QuatT {
        self.relative_default
    }

    #[inline]
    pub fn model_relative(&self) -> QuatT {
        self.model_relative
    }

    #[inline]
    pub fn add_transformation(&self) -> QuatT {
        self.add_transformation
    }

    #[inline]
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    #[inline]
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    #[inline]
    pub fn is_projected(&self) -> bool {
        self.base.flags.contains(AttachmentFlags::PROJECTED)
    }

    pub fn set_absolute_default(&mut self, value: QuatT) {
        self.absolute_default = value;
        self.base.flags.remove(AttachmentFlags::PROJECTED);
    }

    /// 设置绑定姿态下的面坐标系，需要重新投影
    pub fn set_default_face_frame(&mut self, frame: QuatT) {
        self.default_face_frame = frame;
        self.face_frame = frame;
        self.base.flags.remove(AttachmentFlags::PROJECTED);
    }

    /// 设置本帧面坐标系
    #[inline]
    pub fn set_face_frame(&mut self, frame: QuatT) {
        self.face_frame = frame;
    }

    /// 相对绑定面坐标系的偏移
    pub fn project_attachment(&mut self) -> bool {
        self.relative_default = self.default_face_frame.inverse() * self.absolute_default;
        self.model_relative = self.default_face_frame * self.relative_default;
        self.base.flags.insert(AttachmentFlags::PROJECTED);
        true
    }

    /// 无绑定对象
    pub(crate) fn update_empty(&mut self) {
        if !self.is_projected() {
            self.project_attachment();
        }
        self.model_relative = self.face_frame * self.relative_default;
    }

    /// 有绑定对象：跟随面坐标系，叠加模拟，并做距离剔除
    pub(crate) fn update_execute(&mut self, pose: &PoseData, proxies: &[Proxy], sim: &SimulationContext<'_>) {
        self.update_empty();
        self.add_transformation = if self.simulation.is_enabled() {
            self.simulation.update(self.model_relative, pose, proxies, sim)
        } else {
            QuatT::IDENTITY
        };
        let radius = self.base.object.as_ref().map_or(0.0, |o| o.radius());
        self.base
            .flags
            .set(AttachmentFlags::VISIBLE, within_view_distance(radius, sim));
    }

    pub fn world_transform(&self, location: &QuatTS) -> QuatTS {
        *location * (self.model_relative * self.add_transformation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_follow_face_frame() {
        let mut face = FaceAttachment::new(AttachmentBase::new("scar").unwrap());
        let bind = QuatT::new(Quat::from_rotation_y(0.4), Vec3::new(0.0, 0.1, 1.6));
        face.set_default_face_frame(bind);
        face.set_absolute_default(bind * QuatT::from_translation(Vec3::X * 0.01));
        face.update_empty();
        assert!(face.is_projected());
        assert!(face.relative_default().is_equivalent(&QuatT::from_translation(Vec3::X * 0.01), 1.0e-5));

        let moved = QuatT::from_translation(Vec3::Z);
        face.set_face_frame(moved);
        face.update_empty();
        assert!(face.model_relative().t.abs_diff_eq(Vec3::new(0.01, 0.0, 1.0), 1.0e-5));
    }
}
