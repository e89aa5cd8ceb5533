//! 命令缓冲区
//!
//! 每帧每个角色构建一次：`initialize` 之后只能追加命令，`execute` 按追加顺序
//! 执行全部命令并清空。Target 槽位映射到角色当前姿态，Tmp 槽位由缓冲区自己持有。

use glam::Vec3;

use crate::animation::{AnimationSet, ClipId};
use crate::attachment::{AttachmentManager, SimulationContext};
use crate::character::{PhysicsSync, PoseModifier};
use crate::config::{AnimationConfig, FrameContext};
use crate::math::{Aabb, QuatT, QuatTS};
use crate::skeleton::{DefaultSkeleton, IkChain, JointStatus, PoseData, SkeletonPose};

use super::blend::{
    accumulate_rotation, accumulation_reference, blend_additive, blend_override, blend_scale,
    normalize_accumulated,
};
use super::commands::{BlendMode, Command, HemisphereReference, TargetBuffer};

// ============================================================================
// 执行上下文
// ============================================================================

/// 执行命令时可访问的全部数据
pub struct CommandContext<'a> {
    /// Target 槽位（本帧唯一可写姿态）
    pub pose: &'a mut PoseData,
    /// 绑定姿态
    pub default_pose: &'a PoseData,
    pub skeleton: &'a DefaultSkeleton,
    pub animation_set: &'a AnimationSet,
    pub attachments: Option<&'a mut AttachmentManager>,
    pub pose_modifiers: &'a mut [Box<dyn PoseModifier>],
    pub ik_chains: &'a [IkChain],
    pub physics: Option<&'a mut dyn PhysicsSync>,
    pub config: &'a AnimationConfig,
    pub frame: &'a FrameContext,
    /// 角色世界位置
    pub location: QuatTS,
    /// ComputeBoundingBox 的输出
    pub bounding_box: Option<Aabb>,
}

// ============================================================================
// 槽位
// ============================================================================

/// Tmp 槽位数据
#[derive(Clone, Debug, Default)]
struct ScratchPose {
    relative: Vec<QuatT>,
    status: Vec<JointStatus>,
    scale: Option<Vec<Vec3>>,
    /// 逐骨骼权重（x 旋转，y 平移，z 缩放）
    weights: Vec<Vec3>,
}

impl ScratchPose {
    fn resize(&mut self, count: usize) {
        self.relative.resize(count, QuatT::ZERO);
        self.status.resize(count, JointStatus::empty());
        self.weights.resize(count, Vec3::ZERO);
        if let Some(scale) = self.scale.as_mut() {
            scale.resize(count, Vec3::ZERO);
        }
    }
}

/// 一个槽位的可变视图
struct SlotMut<'a> {
    relative: &'a mut [QuatT],
    status: &'a mut [JointStatus],
    scale: Option<&'a mut Vec<Vec3>>,
    weights: &'a mut [Vec3],
}

// ============================================================================
// 命令缓冲区
// ============================================================================

/// 命令缓冲区
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    tmp: ScratchPose,
    target_weights: Vec<Vec3>,
    /// 本帧未写入骨骼的回退值
    fallback: Vec<QuatT>,
    fallback_scale: Option<Vec<Vec3>>,
    location: QuatTS,
    verify_failures: u32,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以本帧起始姿态重置为空命令流
    ///
    /// 回退值根据 `reset_culled_joints_to_bind_pose` 取绑定姿态或上一帧姿态。
    pub fn initialize(&mut self, pose: &SkeletonPose, location: QuatTS, config: &AnimationConfig) {
        if !self.commands.is_empty() {
            log::warn!(
                "[CommandBuffer] 上一帧有 {} 条命令未执行，已丢弃",
                self.commands.len()
            );
            self.commands.clear();
        }

        let count = pose.pose().joint_count();
        self.tmp.resize(count);
        self.target_weights.clear();
        self.target_weights.resize(count, Vec3::ZERO);

        let source = if config.reset_culled_joints_to_bind_pose {
            pose.default_pose()
        } else {
            pose.pose()
        };
        self.fallback.clear();
        self.fallback.extend_from_slice(source.relative_slice());
        self.fallback_scale = source.scale_slice().map(<[Vec3]>::to_vec);
        self.location = location;
    }

    /// 追加一条命令，返回其可变引用以便就地修改字段
    pub fn create_command(&mut self, command: impl Into<Command>) -> &mut Command {
        let index = self.commands.len();
        self.commands.push(command.into());
        &mut self.commands[index]
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn location(&self) -> QuatTS {
        self.location
    }

    /// VerifyFull 累计失败次数
    #[inline]
    pub fn verify_failures(&self) -> u32 {
        self.verify_failures
    }

    /// 按追加顺序执行全部命令，然后清空
    pub fn execute(&mut self, ctx: &mut CommandContext<'_>) {
        let commands = std::mem::take(&mut self.commands);
        for command in &commands {
            self.execute_command(command, ctx);
        }
        self.commands = commands;
        self.commands.clear();
    }

    fn execute_command(&mut self, command: &Command, ctx: &mut CommandContext<'_>) {
        match *command {
            Command::ClearPoseBuffer(c) => self.clear_pose_buffer(ctx.pose, c.target),
            Command::SampleAddAnimFull(c) => {
                self.sample_add(ctx, c.clip, c.time, c.weight, c.target, c.hemisphere, false)
            }
            Command::SampleAddAnimPart(c) => {
                self.sample_add(ctx, c.clip, c.time, c.weight, c.target, c.hemisphere, true)
            }
            Command::NormalizeFull(c) => {
                let epsilon = ctx.config.normalize_epsilon;
                let slot = self.slot(ctx.pose, c.target, false);
                normalize_slot(slot, epsilon);
            }
            Command::ScaleUniformFull(c) => {
                let slot = self.slot(ctx.pose, c.target, false);
                for rel in slot.relative.iter_mut() {
                    rel.t *= c.scale;
                }
            }
            Command::PerJointBlending(c) => self.per_joint_blending(ctx.pose, c.mode, c.layer_weight),
            Command::ApplyFallbackPose(c) => self.apply_fallback(ctx.pose, c.target),
            Command::RunPoseModifier(c) => {
                if !ctx.config.pose_modifiers_enabled {
                    return;
                }
                let index = c.index as usize;
                match ctx.pose_modifiers.get_mut(index) {
                    Some(modifier) => {
                        modifier.execute(ctx.pose, ctx.skeleton, ctx.frame);
                    }
                    None => panic!("[CommandBuffer] 命令流损坏: 姿态修改器索引 {} 越界", index),
                }
            }
            Command::ComputeAbsolutePose(_) => ctx.pose.compute_absolute_pose(ctx.skeleton.parents()),
            Command::ProcessAnimationDrivenIk(_) => {
                if ctx.config.ik_enabled {
                    for chain in ctx.ik_chains {
                        chain.solve(ctx.pose, ctx.skeleton);
                    }
                }
            }
            Command::PrepareAllRedirectedTransformations(_) => {
                if let Some(attachments) = ctx.attachments.as_deref_mut() {
                    attachments.prepare_all_redirected_transformations(ctx.pose, ctx.frame);
                }
            }
            Command::UpdateRedirectedJoint(c) => {
                let sim = SimulationContext {
                    config: ctx.config,
                    frame: ctx.frame,
                    location: ctx.location,
                };
                if let Some(attachments) = ctx.attachments.as_deref_mut() {
                    if !attachments.update_redirected_joint(c.attachment as usize, ctx.pose, &sim) {
                        panic!("[CommandBuffer] 命令流损坏: 重定向挂点索引 {} 无效", c.attachment);
                    }
                }
            }
            Command::GenerateProxyModelRelativeTransformations(_) => {
                if let Some(attachments) = ctx.attachments.as_deref_mut() {
                    attachments.generate_proxy_model_relative_transformations();
                }
            }
            Command::UpdatePendulumRow(c) => {
                let sim = SimulationContext {
                    config: ctx.config,
                    frame: ctx.frame,
                    location: ctx.location,
                };
                if let Some(attachments) = ctx.attachments.as_deref_mut() {
                    if !attachments.update_pendulum_row(c.attachment as usize, ctx.pose, &sim) {
                        panic!("[CommandBuffer] 命令流损坏: 骨骼链挂点索引 {} 无效", c.attachment);
                    }
                }
            }
            Command::SyncPhysics(_) => {
                if let Some(physics) = ctx.physics.as_deref_mut() {
                    physics.sync(ctx.pose.absolute_slice(), &ctx.location);
                }
            }
            Command::ComputeBoundingBox(_) => {
                ctx.bounding_box = Some(ctx.pose.compute_bounding_box());
            }
            Command::VerifyFull(_) => {
                if !ctx.pose.validate(ctx.skeleton.parents(), 1.0e-3) {
                    self.verify_failures += 1;
                    log::error!("[CommandBuffer] 姿态校验失败");
                }
            }
        }
    }

    // ========================================
    // 槽位
    // ========================================

    /// 取槽位视图；`scaling` 为 true 时确保缩放缓冲区已分配
    fn slot<'a>(&'a mut self, pose: &'a mut PoseData, target: TargetBuffer, scaling: bool) -> SlotMut<'a> {
        match target {
            TargetBuffer::Target => {
                if scaling {
                    pose.ensure_scale();
                }
                let (relative, status, scale) = pose.channels_mut();
                SlotMut {
                    relative,
                    status,
                    scale,
                    weights: &mut self.target_weights,
                }
            }
            TargetBuffer::Tmp => {
                let tmp = &mut self.tmp;
                if scaling && tmp.scale.is_none() {
                    tmp.scale = Some(vec![Vec3::ZERO; tmp.relative.len()]);
                }
                SlotMut {
                    relative: &mut tmp.relative,
                    status: &mut tmp.status,
                    scale: tmp.scale.as_mut(),
                    weights: &mut tmp.weights,
                }
            }
        }
    }

    fn clear_pose_buffer(&mut self, pose: &mut PoseData, target: TargetBuffer) {
        let slot = self.slot(pose, target, false);
        slot.relative.fill(QuatT::ZERO);
        slot.status.fill(JointStatus::empty());
        slot.weights.fill(Vec3::ZERO);
        if let Some(scale) = slot.scale {
            scale.fill(Vec3::ZERO);
        }
    }

    // ========================================
    // 采样
    // ========================================

    #[allow(clippy::too_many_arguments)]
    fn sample_add(
        &mut self,
        ctx: &mut CommandContext<'_>,
        clip_id: ClipId,
        time: f32,
        weight: f32,
        target: TargetBuffer,
        hemisphere: HemisphereReference,
        partial: bool,
    ) {
        let Some(clip) = ctx.animation_set.clip(clip_id) else {
            log::error!("[CommandBuffer] 动画 #{} 不存在", clip_id.0);
            return;
        };

        let frame = clip.frame_at(time);
        let default_pose = ctx.default_pose;
        // 基础层的加法动画与绑定姿态组合；叠加层保持原始增量
        let compose = clip.additive && !partial;
        let slot = self.slot(ctx.pose, target, clip.has_scale());
        let SlotMut {
            relative,
            status,
            mut scale,
            weights,
        } = slot;

        for track in &clip.tracks {
            let j = track.joint_id() as usize;
            if track.joint_id() < 0 || j >= relative.len() {
                continue;
            }
            let sample = track.sample(frame);
            let default = default_pose.relative(j);

            if let Some(mut q) = sample.rotation {
                if compose {
                    q = q * default.q;
                }
                let reference = match hemisphere {
                    HemisphereReference::DefaultPose if clip.additive && partial => glam::Quat::IDENTITY,
                    HemisphereReference::DefaultPose => default.q,
                    HemisphereReference::Accumulation => accumulation_reference(relative[j].q, q),
                };
                accumulate_rotation(&mut relative[j].q, q, weight, reference);
                status[j] |= JointStatus::ORIENTATION;
                weights[j].x += weight;
            }

            if let Some(mut t) = sample.position {
                if compose {
                    t += default.t;
                }
                relative[j].t += t * weight;
                status[j] |= JointStatus::POSITION;
                weights[j].y += weight;
            }

            if let (Some(s), Some(scale)) = (sample.scale, scale.as_deref_mut()) {
                scale[j] += s * weight;
                status[j] |= JointStatus::SCALE;
                weights[j].z += weight;
            }
        }
    }

    // ========================================
    // 混合
    // ========================================

    fn per_joint_blending(&mut self, pose: &mut PoseData, mode: BlendMode, layer_weight: f32) {
        if self.tmp.scale.is_some() {
            pose.ensure_scale();
        }
        let tmp = &self.tmp;
        let (relative, status, mut scale) = pose.channels_mut();
        let additive = mode == BlendMode::Additive;

        for j in 0..relative.len().min(tmp.relative.len()) {
            let layer_status = tmp.status[j];
            if layer_status.is_empty() {
                continue;
            }
            let component = |flag: JointStatus, w: f32| {
                if layer_status.contains(flag) {
                    (w * layer_weight).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            };
            let raw = tmp.weights[j];
            let w = Vec3::new(
                component(JointStatus::ORIENTATION, raw.x.min(1.0)),
                component(JointStatus::POSITION, raw.y.min(1.0)),
                component(JointStatus::SCALE, raw.z.min(1.0)),
            );

            relative[j] = if additive {
                blend_additive(relative[j], tmp.relative[j], w)
            } else {
                blend_override(relative[j], tmp.relative[j], w)
            };

            if let (Some(dst), Some(src)) = (scale.as_deref_mut(), tmp.scale.as_ref()) {
                if layer_status.contains(JointStatus::SCALE) {
                    dst[j] = blend_scale(dst[j], src[j], w.z, additive);
                }
            }
            status[j] |= layer_status;
        }
    }

    fn apply_fallback(&mut self, pose: &mut PoseData, target: TargetBuffer) {
        let fallback = std::mem::take(&mut self.fallback);
        let fallback_scale = self.fallback_scale.take();
        {
            let slot = self.slot(pose, target, false);
            for j in 0..slot.relative.len().min(fallback.len()) {
                let written = slot.status[j];
                if !written.contains(JointStatus::ORIENTATION) {
                    slot.relative[j].q = fallback[j].q;
                }
                if !written.contains(JointStatus::POSITION) {
                    slot.relative[j].t = fallback[j].t;
                }
            }
            if let Some(scale) = slot.scale {
                for j in 0..scale.len() {
                    if !slot.status[j].contains(JointStatus::SCALE) {
                        scale[j] = fallback_scale.as_ref().map_or(Vec3::ONE, |s| s[j]);
                    }
                }
            }
        }
        self.fallback = fallback;
        self.fallback_scale = fallback_scale;
    }
}

/// 归一化槽位：旋转单位化，平移与缩放除以累计权重
fn normalize_slot(slot: SlotMut<'_>, epsilon: f32) {
    for j in 0..slot.relative.len() {
        let status = slot.status[j];
        let w = slot.weights[j];
        if status.contains(JointStatus::ORIENTATION) {
            slot.relative[j].q = normalize_accumulated(slot.relative[j].q, epsilon);
        }
        if status.contains(JointStatus::POSITION) && w.y > epsilon {
            slot.relative[j].t /= w.y;
        }
    }
    if let Some(scale) = slot.scale {
        for j in 0..scale.len() {
            let w = slot.weights[j].z;
            if slot.status[j].contains(JointStatus::SCALE) && w > epsilon {
                scale[j] /= w;
            }
        }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        debug_assert!(
            self.commands.is_empty() || std::thread::panicking(),
            "CommandBuffer 销毁时仍有 {} 条命令未执行",
            self.commands.len()
        );
    }
}
