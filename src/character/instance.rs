//! 角色实例
//!
//! 单帧流程：
//! 1. 执行延迟的绑定修改，取出子角色变更日志
//! 2. 推进动画层，构建命令流（采样混合、姿态修改器、绝对姿态、IK、挂点、物理同步、包围盒）
//! 3. 执行命令流，结束本帧写入
//! 4. 更新骨骼/面挂点，输出绑定对象的世界变换

use std::sync::Arc;

use crate::animation::{AnimParams, AnimationSet, SkeletonAnim};
use crate::attachment::{AttachedObjectUpdate, AttachmentFlags, AttachmentManager, SimulationContext};
use crate::command::{
    CommandBuffer, CommandContext, ComputeAbsolutePose, ComputeBoundingBox, ProcessAnimationDrivenIk,
    RunPoseModifier, SyncPhysics, VerifyFull,
};
use crate::config::{AnimationConfig, FrameContext};
use crate::error::{AnimError, Result};
use crate::math::{Aabb, QuatTS};
use crate::skeleton::{DefaultSkeleton, IkChain, SkeletonPose};

use super::physics_sync::PhysicsSync;
use super::pose_modifier::PoseModifier;

/// 角色实例
pub struct CharacterInstance {
    name: String,
    pose: SkeletonPose,
    anim: SkeletonAnim,
    animation_set: Arc<AnimationSet>,
    attachments: AttachmentManager,
    commands: CommandBuffer,
    pose_modifiers: Vec<Box<dyn PoseModifier>>,
    ik_chains: Vec<IkChain>,
    physics: Option<Box<dyn PhysicsSync>>,
    config: AnimationConfig,
    /// 世界位置；子角色每帧由父角色挂点覆盖
    location: QuatTS,
    /// 父角色传下来的隐藏标志
    parent_hidden: AttachmentFlags,
    attached_updates: Vec<AttachedObjectUpdate>,
    frame_count: u64,
}

impl CharacterInstance {
    /// 创建角色；动画集必须基于同一骨架
    pub fn new(
        name: impl Into<String>,
        skeleton: Arc<DefaultSkeleton>,
        animation_set: Arc<AnimationSet>,
        config: AnimationConfig,
    ) -> Result<Self> {
        let name = name.into();
        let set_joints = animation_set.skeleton().joint_count();
        if !Arc::ptr_eq(animation_set.skeleton(), &skeleton) && set_joints != skeleton.joint_count() {
            return Err(AnimError::Skeleton(format!(
                "角色 {} 的骨架有 {} 个骨骼，动画集骨架有 {} 个",
                name,
                skeleton.joint_count(),
                set_joints
            )));
        }

        log::info!(
            "[Character] 创建角色 {}: {} 个骨骼, {} 个动画",
            name,
            skeleton.joint_count(),
            animation_set.len()
        );

        Ok(Self {
            name,
            pose: SkeletonPose::new(Arc::clone(&skeleton)),
            anim: SkeletonAnim::new(),
            animation_set,
            attachments: AttachmentManager::new(skeleton, &config),
            commands: CommandBuffer::new(),
            pose_modifiers: Vec::new(),
            ik_chains: Vec::new(),
            physics: None,
            config,
            location: QuatTS::IDENTITY,
            parent_hidden: AttachmentFlags::empty(),
            attached_updates: Vec::new(),
            frame_count: 0,
        })
    }

    // ========================================
    // 访问
    // ========================================

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<DefaultSkeleton> {
        self.pose.skeleton()
    }

    #[inline]
    pub fn skeleton_pose(&self) -> &SkeletonPose {
        &self.pose
    }

    #[inline]
    pub fn skeleton_anim(&self) -> &SkeletonAnim {
        &self.anim
    }

    #[inline]
    pub fn skeleton_anim_mut(&mut self) -> &mut SkeletonAnim {
        &mut self.anim
    }

    #[inline]
    pub fn animation_set(&self) -> &Arc<AnimationSet> {
        &self.animation_set
    }

    #[inline]
    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    #[inline]
    pub fn attachments_mut(&mut self) -> &mut AttachmentManager {
        &mut self.attachments
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// 修改配置，下一帧生效
    #[inline]
    pub fn config_mut(&mut self) -> &mut AnimationConfig {
        &mut self.config
    }

    #[inline]
    pub fn location(&self) -> QuatTS {
        self.location
    }

    pub fn set_location(&mut self, location: QuatTS) {
        self.location = location;
    }

    #[inline]
    pub fn parent_hidden(&self) -> AttachmentFlags {
        self.parent_hidden
    }

    pub fn set_parent_hidden(&mut self, flags: AttachmentFlags) {
        self.parent_hidden = flags & AttachmentFlags::HIDE_ALL_PASSES;
    }

    /// 已处理的帧数
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 最近一帧输出的绑定对象变换
    #[inline]
    pub fn attached_updates(&self) -> &[AttachedObjectUpdate] {
        &self.attached_updates
    }

    /// 世界空间包围盒
    pub fn world_bounding_box(&self) -> Aabb {
        self.pose.bounding_box().transformed(&self.location)
    }

    // ========================================
    // 扩展
    // ========================================

    /// 注册姿态修改器，返回其序号
    pub fn add_pose_modifier(&mut self, modifier: Box<dyn PoseModifier>) -> usize {
        if self.pose_modifiers.len() >= u16::MAX as usize {
            panic!("[Character] 角色 {} 的姿态修改器数量超过上限", self.name);
        }
        self.pose_modifiers.push(modifier);
        self.pose_modifiers.len() - 1
    }

    pub fn clear_pose_modifiers(&mut self) {
        self.pose_modifiers.clear();
    }

    pub fn add_ik_chain(&mut self, chain: IkChain) {
        self.ik_chains.push(chain);
    }

    #[inline]
    pub fn ik_chains(&self) -> &[IkChain] {
        &self.ik_chains
    }

    /// 设置物理同步目标，返回之前的目标
    pub fn set_physics(&mut self, physics: Option<Box<dyn PhysicsSync>>) -> Option<Box<dyn PhysicsSync>> {
        std::mem::replace(&mut self.physics, physics)
    }

    // ========================================
    // 动画
    // ========================================

    /// 按名称在指定层开始播放，返回是否入队
    pub fn start_animation(&mut self, layer: usize, name: &str, params: AnimParams) -> Result<bool> {
        self.anim.start_animation(&self.animation_set, layer, name, params)
    }

    pub fn stop_animation_in_layer(&mut self, layer: usize, blend_out_time: f32) -> Result<()> {
        self.anim.stop_animation_in_layer(layer, blend_out_time)
    }

    // ========================================
    // 每帧
    // ========================================

    /// 执行延迟的绑定修改并取出子角色变更
    pub fn flush_changes(&mut self) {
        self.attachments.update_bindings();
        self.attachments.process_changes();
    }

    /// 处理一帧
    pub fn update(&mut self, frame: &FrameContext) {
        self.flush_changes();
        self.anim.update(frame.delta_time);

        self.build_commands();
        self.execute_commands(frame);

        let sim = SimulationContext {
            config: &self.config,
            frame,
            location: self.location,
        };
        self.attachments.update_sockets(self.pose.pose(), &sim);
        self.attached_updates = self
            .attachments
            .update_attached_objects(&self.location, self.parent_hidden);
        self.frame_count += 1;
    }

    fn build_commands(&mut self) {
        let config = &self.config;
        let buffer = &mut self.commands;
        buffer.initialize(&self.pose, self.location, config);

        self.anim.create_commands(&self.animation_set, buffer, config);
        if config.pose_modifiers_enabled {
            for index in 0..self.pose_modifiers.len() {
                buffer.create_command(RunPoseModifier { index: index as u16 });
            }
        }
        buffer.create_command(ComputeAbsolutePose);
        if config.ik_enabled && !self.ik_chains.is_empty() {
            buffer.create_command(ProcessAnimationDrivenIk);
        }
        self.attachments.create_commands(buffer);
        if self.physics.is_some() {
            buffer.create_command(SyncPhysics);
        }
        buffer.create_command(ComputeBoundingBox);
        if config.verify_pose {
            buffer.create_command(VerifyFull);
        }
    }

    fn execute_commands(&mut self, frame: &FrameContext) {
        let skeleton = Arc::clone(self.pose.skeleton());
        self.pose.begin_writing();

        let bounding_box = match self.pose.split_for_execute() {
            Some((pose, default_pose)) => {
                let physics: Option<&mut dyn PhysicsSync> = match &mut self.physics {
                    Some(physics) => Some(physics.as_mut()),
                    None => None,
                };
                let mut ctx = CommandContext {
                    pose,
                    default_pose,
                    skeleton: &skeleton,
                    animation_set: &self.animation_set,
                    attachments: Some(&mut self.attachments),
                    pose_modifiers: &mut self.pose_modifiers,
                    ik_chains: &self.ik_chains,
                    physics,
                    config: &self.config,
                    frame,
                    location: self.location,
                    bounding_box: None,
                };
                self.commands.execute(&mut ctx);
                ctx.bounding_box
            }
            None => {
                log::error!("[Character] 角色 {} 的姿态不可写，跳过本帧命令", self.name);
                None
            }
        };

        self.pose.finish_writing();
        if let Some(bbox) = bounding_box {
            self.pose.set_bounding_box(bbox);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationClip, JointTrack};
    use crate::math::QuatT;
    use crate::skeleton::{IkLink, JointDesc, PoseData};
    use glam::{Quat, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn skeleton() -> Arc<DefaultSkeleton> {
        Arc::new(
            DefaultSkeleton::build(&[
                JointDesc::new("root", -1, QuatT::IDENTITY),
                JointDesc::new("spine", 0, QuatT::from_translation(Vec3::Z)),
                JointDesc::new("head", 1, QuatT::from_translation(Vec3::Z)),
            ])
            .unwrap(),
        )
    }

    fn character() -> CharacterInstance {
        let skel = skeleton();
        let set = Arc::new(AnimationSet::new(Arc::clone(&skel)));
        CharacterInstance::new("hero", skel, set, AnimationConfig::default()).unwrap()
    }

    struct Counter(Arc<AtomicUsize>);

    impl PoseModifier for Counter {
        fn execute(&mut self, pose: &mut PoseData, _: &DefaultSkeleton, _: &FrameContext) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            // 抬高 spine
            let mut rel = pose.relative(1);
            rel.t.z += 1.0;
            pose.set_relative(1, rel);
            true
        }
    }

    struct Recorder(Arc<AtomicUsize>);

    impl PhysicsSync for Recorder {
        fn sync(&mut self, absolute: &[QuatT], _: &QuatTS) {
            self.0.store(absolute.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_idle_frame_keeps_bind_pose() {
        let mut c = character();
        c.update(&FrameContext::default());
        // 没有动画时回退到绑定姿态
        assert!(c.skeleton_pose().joint_absolute(2).unwrap().t.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1.0e-5));
        assert_eq!(c.frame_count(), 1);
        assert!(!c.skeleton_pose().is_writeable());
    }

    #[test]
    fn test_modifier_runs_before_absolute_pose() {
        let mut c = character();
        let calls = Arc::new(AtomicUsize::new(0));
        c.add_pose_modifier(Box::new(Counter(Arc::clone(&calls))));
        c.update(&FrameContext::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(c.skeleton_pose().joint_absolute(2).unwrap().t.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1.0e-5));

        c.config_mut().pose_modifiers_enabled = false;
        c.update(&FrameContext::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_physics_receives_absolute_pose() {
        let mut c = character();
        let count = Arc::new(AtomicUsize::new(0));
        assert!(c.set_physics(Some(Box::new(Recorder(Arc::clone(&count))))).is_none());
        c.update(&FrameContext::default());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sampled_animation_moves_joint() {
        let skel = skeleton();
        let mut set = AnimationSet::new(Arc::clone(&skel));
        let rotated = Quat::from_rotation_x(0.5);
        let mut clip = AnimationClip::new("nod", 30.0);
        let mut track = JointTrack::new("spine");
        track.insert_rotation(0, rotated);
        track.insert_rotation(1, rotated);
        clip.add_track(track);
        set.add_clip(clip).unwrap();

        let mut c = CharacterInstance::new("hero", skel, Arc::new(set), AnimationConfig::default()).unwrap();
        assert!(c.start_animation(0, "nod", AnimParams::looping().with_transition(0.0)).unwrap());
        c.update(&FrameContext::default());

        let spine = c.skeleton_pose().joint_relative(1).unwrap();
        assert!(spine.q.abs_diff_eq(rotated, 1.0e-4));
        assert!(c.start_animation(0, "missing", AnimParams::default()).is_err());
    }

    #[test]
    fn test_ik_chain_registered() {
        let mut c = character();
        let mut chain = IkChain::new(2, vec![IkLink::new(1)]);
        chain.goal = Some(Vec3::new(0.0, 1.0, 1.0));
        c.add_ik_chain(chain);
        c.update(&FrameContext::default());

        let head = c.skeleton_pose().joint_absolute(2).unwrap();
        assert!(head.t.distance(Vec3::new(0.0, 1.0, 1.0)) < 0.05);
        assert!(c.skeleton_pose().pose().validate(c.skeleton().parents(), 1.0e-3));
    }

    #[test]
    fn test_mismatched_animation_set_rejected() {
        let other = Arc::new(DefaultSkeleton::build(&[JointDesc::new("root", -1, QuatT::IDENTITY)]).unwrap());
        let set = Arc::new(AnimationSet::new(other));
        let result = CharacterInstance::new("hero", skeleton(), set, AnimationConfig::default());
        assert!(matches!(result, Err(AnimError::Skeleton(_))));
    }
}
