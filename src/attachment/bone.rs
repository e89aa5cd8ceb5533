//! 骨骼挂点
//!
//! 挂点跟随一根骨骼：`model_relative = absolute(joint) * relative_default`。
//! `relative_default` 由绑定姿态下的绝对默认变换投影得到，投影是进入
//! PROJECTED 状态的唯一途径。骨骼名无法解析时 joint_id 为 -1，
//! 更新直接返回，错误只记录一次。

use glam::Vec3;

use crate::math::{QuatT, QuatTS};
use crate::skeleton::{DefaultSkeleton, PoseData};

use super::base::{within_view_distance, AttachmentBase};
use super::flags::AttachmentFlags;
use super::proxy::Proxy;
use super::simulation::{Simulation, SimulationContext};

/// 骨骼挂点
#[derive(Clone, Debug)]
pub struct BoneAttachment {
    pub(crate) base: AttachmentBase,
    joint_name: String,
    pub(crate) joint_id: i32,
    /// 绑定姿态下的模型空间变换
    absolute_default: QuatT,
    /// 相对骨骼的偏移
    relative_default: QuatT,
    model_relative: QuatT,
    /// 次级运动附加变换
    add_transformation: QuatT,
    pub(crate) simulation: Simulation,
    invalid_joint_logged: bool,
}

impl BoneAttachment {
    pub(crate) fn new(base: AttachmentBase, joint_name: &str) -> Self {
        Self {
            base,
            joint_name: joint_name.to_string(),
            joint_id: -1,
            absolute_default: QuatT::IDENTITY,
            relative_default: QuatT::IDENTITY,
            model_relative: QuatT::IDENTITY,
            add_transformation: QuatT::IDENTITY,
            simulation: Simulation::default(),
            invalid_joint_logged: false,
        }
    }

    #[inline]
    pub fn joint_name(&self) -> &str {
        &self.joint_name
    }

    #[inline]
    pub fn joint_id(&self) -> i32 {
        self.joint_id
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

    /// 结果写回骨骼（重定向挂点）
    #[inline]
    pub fn is_redirect(&self) -> bool {
        self.simulation.params.use_redirect
    }

    /// 修改绝对默认变换，需要重新投影
    pub fn set_absolute_default(&mut self, value: QuatT) {
        self.absolute_default = value;
        self.base.flags.remove(AttachmentFlags::PROJECTED);
    }

    /// 按相对骨骼的偏移反推绝对默认变换，再走一次投影
    ///
    /// 骨骼无法解析时保持未投影并返回 false。
    pub fn set_relative_default(&mut self, value: QuatT, skeleton: &DefaultSkeleton) -> bool {
        self.resolve_joint(skeleton);
        if self.joint_id < 0 {
            self.log_invalid_joint();
            return false;
        }
        self.absolute_default = skeleton.default_absolute(self.joint_id as usize) * value;
        self.project_attachment(skeleton)
    }

    /// 根据绑定姿态计算相对骨骼的偏移
    ///
    /// 成功后满足 `default_absolute(joint) * relative_default == absolute_default`。
    pub fn project_attachment(&mut self, skeleton: &DefaultSkeleton) -> bool {
        self.joint_id = skeleton.joint_id_by_name(&self.joint_name);
        if self.joint_id < 0 {
            self.log_invalid_joint();
            self.base.flags.remove(AttachmentFlags::PROJECTED);
            return false;
        }
        let joint_default = skeleton.default_absolute(self.joint_id as usize);
        self.relative_default = joint_default.inverse() * self.absolute_default;
        self.model_relative = joint_default * self.relative_default;
        self.base.flags.insert(AttachmentFlags::PROJECTED);
        self.invalid_joint_logged = false;
        true
    }

    /// 重新按名称解析骨骼
    pub(crate) fn resolve_joint(&mut self, skeleton: &DefaultSkeleton) {
        self.joint_id = skeleton.joint_id_by_name(&self.joint_name);
    }

    fn log_invalid_joint(&mut self) {
        if !self.invalid_joint_logged {
            self.invalid_joint_logged = true;
            log::error!(
                "[Attachment] 挂点 '{}' 的骨骼 '{}' 不存在",
                self.base.name(),
                self.joint_name
            );
        }
    }

    /// 未投影时先投影；返回可用的骨骼索引
    fn prepare(&mut self, skeleton: &DefaultSkeleton, pose: &PoseData) -> Option<usize> {
        if !self.is_projected() {
            self.project_attachment(skeleton);
        }
        if self.joint_id < 0 || self.joint_id as usize >= pose.joint_count() {
            self.log_invalid_joint();
            return None;
        }
        Some(self.joint_id as usize)
    }

    // ========================================
    // 更新
    // ========================================

    /// 无绑定对象：只跟随骨骼
    pub(crate) fn update_empty(&mut self, pose: &PoseData, skeleton: &DefaultSkeleton) {
        if let Some(j) = self.prepare(skeleton, pose) {
            self.model_relative = pose.absolute(j) * self.relative_default;
        }
    }

    /// 有绑定对象：跟随骨骼，叠加模拟，并做距离剔除
    pub(crate) fn update_execute(
        &mut self,
        pose: &PoseData,
        skeleton: &DefaultSkeleton,
        proxies: &[Proxy],
        sim: &SimulationContext<'_>,
    ) {
        let Some(j) = self.prepare(skeleton, pose) else {
            return;
        };
        self.model_relative = pose.absolute(j) * self.relative_default;
        self.add_transformation = if self.simulation.is_enabled() && !self.is_redirect() {
            self.simulation.update(self.model_relative, pose, proxies, sim)
        } else {
            QuatT::IDENTITY
        };
        self.update_visibility(sim);
    }

    /// 模拟结果写回骨骼，并重新计算该骨骼及其子孙的绝对变换
    pub(crate) fn update_redirected(
        &mut self,
        pose: &mut PoseData,
        skeleton: &DefaultSkeleton,
        proxies: &[Proxy],
        sim: &SimulationContext<'_>,
    ) {
        let Some(j) = self.prepare(skeleton, pose) else {
            return;
        };
        self.model_relative = pose.absolute(j) * self.relative_default;
        let add = self.simulation.update(self.model_relative, pose, proxies, sim);
        // 附加变换已经写进骨骼
        self.add_transformation = QuatT::IDENTITY;

        let rel_default = self.relative_default;
        let redirected = pose.relative(j) * (rel_default * add * rel_default.inverse());
        pose.set_relative(j, redirected);

        let parents = skeleton.parents();
        pose.compute_absolute_for(&[j], parents);
        pose.compute_absolute_for(&self.simulation.redirect_children, parents);
        self.model_relative = pose.absolute(j) * rel_default;
    }

    fn update_visibility(&mut self, sim: &SimulationContext<'_>) {
        let radius = self.base.object.as_ref().map_or(0.0, |o| o.radius());
        self.base
            .flags
            .set(AttachmentFlags::VISIBLE, within_view_distance(radius, sim));
    }

    /// 世界变换（含附加变换）
    pub fn world_transform(&self, location: &QuatTS) -> QuatTS {
        *location * (self.model_relative * self.add_transformation)
    }

    /// 模型空间位置（含附加变换）
    #[inline]
    pub fn model_position(&self) -> Vec3 {
        (self.model_relative * self.add_transformation).t
    }
}
