//! 姿态与命令流的不变量

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use character_anim::animation::JointTrack;
use character_anim::attachment::{
    AttachmentObject, ClampType, ProcessingRange, Simulation, SimulationParams,
};
use character_anim::command::CommandContext;
use character_anim::skeleton::PoseData;
use character_anim::{
    AnimParams, AnimationClip, AnimationConfig, AnimationSet, AttachmentType, CommandBuffer,
    DefaultSkeleton, FrameContext, PoseModifier, QuatT, SkeletonAnim, SkeletonPose,
};
use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;
use test_case::test_case;

use common::{character, character_with, humanoid};

/// spine 绕 X 轴摆动，head 平移
fn sway_set() -> AnimationSet {
    let mut set = AnimationSet::new(humanoid());
    let mut clip = AnimationClip::new("sway", 30.0);
    let mut spine = JointTrack::new("spine");
    spine.insert_rotation(0, Quat::IDENTITY);
    spine.insert_rotation(15, Quat::from_rotation_x(0.6));
    spine.insert_rotation(30, Quat::from_rotation_x(-0.3));
    let mut head = JointTrack::new("head");
    head.insert_position(0, Vec3::Z);
    head.insert_position(30, Vec3::new(0.0, 0.2, 1.1));
    clip.add_track(spine);
    clip.add_track(head);
    set.add_clip(clip).unwrap();
    set
}

#[test]
fn test_absolute_equals_parent_times_relative() {
    let mut hero = character_with(sway_set(), AnimationConfig::default());
    hero.start_animation(0, "sway", AnimParams::looping()).unwrap();
    let frame = FrameContext::with_delta(1.0 / 30.0);
    for _ in 0..20 {
        hero.update(&frame);
        let pose = hero.skeleton_pose().pose();
        let parents = hero.skeleton().parents();
        for j in 1..pose.joint_count() {
            let expected = pose.absolute(parents[j] as usize) * pose.relative(j);
            assert!(pose.absolute(j).is_equivalent(&expected, 1.0e-4));
            assert!((pose.absolute(j).q.length() - 1.0).abs() < 1.0e-4);
        }
    }
}

#[test_case(0, QuatT::new(Quat::from_rotation_y(0.4), Vec3::new(0.3, -0.2, 0.1)) ; "root")]
#[test_case(1, QuatT::from_translation(Vec3::new(0.0, 0.5, 1.5)) ; "spine")]
#[test_case(2, QuatT::new(Quat::from_rotation_z(-1.2), Vec3::new(1.0, 2.0, 3.0)) ; "head")]
fn test_projection_round_trip(joint: usize, absolute: QuatT) {
    let skeleton = humanoid();
    let mut hero = character();
    let name = skeleton.joint_name(joint).unwrap().to_string();
    let manager = hero.attachments_mut();
    let index = manager.create_attachment("socket", AttachmentType::Bone, &name).unwrap();
    let bone = manager.get_mut(index).unwrap().as_bone_mut().unwrap();

    bone.set_absolute_default(absolute);
    assert!(!bone.is_projected());
    assert!(bone.project_attachment(&skeleton));
    let first = bone.relative_default();
    let rebuilt = skeleton.default_absolute(joint) * first;
    assert!(rebuilt.is_equivalent(&absolute, 1.0e-5));

    // 再投影一次结果不变
    assert!(bone.project_attachment(&skeleton));
    assert_eq!(bone.relative_default(), first);
}

#[test]
fn test_processing_partition_is_ordered() {
    let mut hero = character();
    let manager = hero.attachments_mut();
    let stat = || AttachmentObject::StatObj {
        name: "rock.cgf".to_string(),
        radius: 0.1,
    };

    manager.create_attachment("skin", AttachmentType::Skin, "").unwrap();
    manager.create_attachment("face_a", AttachmentType::Face, "").unwrap();
    manager.create_attachment("empty_head", AttachmentType::Bone, "head").unwrap();
    manager.create_attachment("static_spine", AttachmentType::Bone, "spine").unwrap();
    manager.create_attachment("light", AttachmentType::Bone, "root").unwrap();
    manager.create_attachment("redirect_head", AttachmentType::Bone, "head").unwrap();
    manager.create_attachment("redirect_spine", AttachmentType::Bone, "spine").unwrap();
    manager.create_attachment("face_b", AttachmentType::Face, "").unwrap();
    manager.add_binding("static_spine", stat()).unwrap();
    manager.add_binding("face_b", stat()).unwrap();
    manager.add_binding("light", AttachmentObject::Light { radius: 2.0 }).unwrap();
    for name in ["redirect_head", "redirect_spine"] {
        let index = manager.index_by_name(name).unwrap();
        let bone = manager.get_mut(index).unwrap().as_bone_mut().unwrap();
        *bone.simulation_mut() = Simulation::new(SimulationParams {
            clamp_type: ClampType::PendulumCone,
            use_redirect: true,
            gravity: 0.0,
            ..Default::default()
        });
    }

    hero.update(&FrameContext::default());

    let manager = hero.attachments();
    let processing = manager.processing();
    assert!(!processing.is_dirty());
    let mut expected_start = 0;
    for range in ProcessingRange::ALL {
        let bounds = processing.bounds(range);
        assert_eq!(bounds.start, expected_start);
        expected_start = bounds.end;
        for &i in processing.range(range) {
            assert_eq!(ProcessingRange::classify(manager.get(i).unwrap()), range);
        }
    }
    assert_eq!(expected_start, manager.count());

    let joints: Vec<i32> = processing
        .range(ProcessingRange::BoneRedirect)
        .iter()
        .map(|&i| manager.get(i).unwrap().joint_id())
        .collect();
    assert_eq!(joints, vec![1, 2]);

    // 同一区间内保持创建顺序
    let faces: Vec<&str> = processing
        .span(ProcessingRange::FaceEmpty, ProcessingRange::FaceExecuteUnsafe)
        .iter()
        .map(|&i| manager.get(i).unwrap().name())
        .collect();
    assert_eq!(faces, vec!["face_a", "face_b"]);
}

/// 执行同一条命令流，返回结束后的姿态
fn run_recorded(
    skeleton: &Arc<DefaultSkeleton>,
    set: &AnimationSet,
    commands: &[character_anim::Command],
    config: &AnimationConfig,
) -> PoseData {
    let mut pose = SkeletonPose::new(Arc::clone(skeleton));
    let default_pose = pose.default_pose().clone();
    let mut buffer = CommandBuffer::new();
    buffer.initialize(&pose, Default::default(), config);
    for &command in commands {
        buffer.create_command(command);
    }

    let frame = FrameContext::default();
    pose.begin_writing();
    let target = pose.writeable_pose().unwrap();
    let mut ctx = CommandContext {
        pose: target,
        default_pose: &default_pose,
        skeleton,
        animation_set: set,
        attachments: None,
        pose_modifiers: &mut [],
        ik_chains: &[],
        physics: None,
        config,
        frame: &frame,
        location: Default::default(),
        bounding_box: None,
    };
    buffer.execute(&mut ctx);
    assert!(buffer.is_empty());
    pose.finish_writing();
    pose.pose().clone()
}

#[test]
fn test_recorded_commands_are_deterministic() {
    let set = sway_set();
    let skeleton = Arc::clone(set.skeleton());
    let config = AnimationConfig::default();

    let mut anim = SkeletonAnim::new();
    anim.start_animation(&set, 0, "sway", AnimParams::looping()).unwrap();
    anim.start_animation(&set, 0, "sway", AnimParams::looping().with_transition(0.5))
        .unwrap();
    anim.update(0.37);

    let pose = SkeletonPose::new(Arc::clone(&skeleton));
    let mut recorder = CommandBuffer::new();
    recorder.initialize(&pose, Default::default(), &config);
    anim.create_commands(&set, &mut recorder, &config);
    recorder.create_command(character_anim::command::ComputeAbsolutePose);
    let commands = recorder.commands().to_vec();
    assert!(!commands.is_empty());

    let a = run_recorded(&skeleton, &set, &commands, &config);
    let b = run_recorded(&skeleton, &set, &commands, &config);
    assert_eq!(a.relative_slice(), b.relative_slice());
    assert_eq!(a.absolute_slice(), b.absolute_slice());
}

/// 只在第一次调用时把 head 抬高 5 米
struct OneShotLift(Arc<AtomicBool>);

impl PoseModifier for OneShotLift {
    fn execute(&mut self, pose: &mut PoseData, _: &DefaultSkeleton, _: &FrameContext) -> bool {
        if self.0.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut head = pose.relative(2);
        head.t.z += 5.0;
        pose.set_relative(2, head);
        true
    }
}

#[test_case(true, 1.0 ; "fallback to bind pose")]
#[test_case(false, 6.0 ; "fallback to previous frame")]
fn test_unwritten_joint_fallback(reset_to_bind_pose: bool, expected_head_z: f32) {
    let config = AnimationConfig {
        reset_culled_joints_to_bind_pose: reset_to_bind_pose,
        ..AnimationConfig::default()
    };
    let mut hero = character_with(sway_set(), config);
    hero.add_pose_modifier(Box::new(OneShotLift(Arc::new(AtomicBool::new(false)))));

    let frame = FrameContext::default();
    hero.update(&frame);
    assert_eq!(hero.skeleton_pose().joint_relative(2).unwrap().t.z, 6.0);

    // 第二帧没有动画写入 head
    hero.update(&frame);
    let head = hero.skeleton_pose().joint_relative(2).unwrap();
    assert!((head.t.z - expected_head_z).abs() < 1.0e-5);
}
