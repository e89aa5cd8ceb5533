//! 端到端场景：定义加载、重名挂点、无外力摆锤

mod common;

use character_anim::attachment::{parse_attachment_list, AttachmentNode, AttachmentSnapshot};
use character_anim::{AnimError, AttachmentType, FrameContext, QuatT};
use glam::Vec3;
use pretty_assertions::assert_eq;

use common::{character, init_logger, StaticResolver};

fn attachment_list(children: Vec<AttachmentNode>) -> AttachmentNode {
    children
        .into_iter()
        .fold(AttachmentNode::new("AttachmentList"), AttachmentNode::with_child)
}

#[test]
fn test_hat_follows_head_in_bind_pose() {
    init_logger();
    let mut hero = character();
    // 默认绝对变换等于 head 的绑定姿态
    let root = attachment_list(vec![AttachmentNode::new("Attachment")
        .with_attr("Type", "CA_BONE")
        .with_attr("AName", "hat")
        .with_attr("BoneName", "head")
        .with_attr("Binding", "objects/hat.cgf")
        .with_attr("Rotation", "1,0,0,0")
        .with_attr("Position", "0,0,2")]);
    let descs = parse_attachment_list(&root).unwrap();
    let created = hero
        .attachments_mut()
        .init_attachment_list(&descs, &mut StaticResolver, true);
    assert_eq!(created, 1);

    hero.update(&FrameContext::default());

    let hat = hero.attachments().get_by_name("hat").unwrap();
    let bone = hat.as_bone().unwrap();
    assert!(bone.relative_default().is_equivalent(&QuatT::IDENTITY, 1.0e-5));
    let head = hero.skeleton_pose().joint_absolute(2).unwrap();
    assert!(hat.model_relative().is_equivalent(&head, 1.0e-5));
    assert!(!hat.is_attachment_hidden());
}

#[test]
fn test_duplicate_name_differs_only_by_case() {
    let mut hero = character();
    let manager = hero.attachments_mut();
    manager.create_attachment("Hat", AttachmentType::Bone, "head").unwrap();
    let second = manager.create_attachment("hat", AttachmentType::Bone, "head");
    assert!(matches!(second, Err(AnimError::DuplicateAttachment { .. })));
    assert_eq!(manager.count(), 1);
}

#[test]
fn test_pendulum_without_forces_settles_on_joint() {
    init_logger();
    let mut hero = character();
    let root = attachment_list(vec![AttachmentNode::new("Attachment")
        .with_attr("Type", "CA_BONE")
        .with_attr("AName", "ponytail")
        .with_attr("BoneName", "head")
        .with_attr("Binding", "objects/ponytail.cgf")
        .with_attr("Rotation", "1,0,0,0")
        .with_attr("Position", "0,0,2")
        .with_attr("PA_PendulumType", "1")
        .with_attr("PA_Gravity", "0")
        .with_attr("PA_Stiffness", "0")
        .with_attr("PA_MaxAngle", "60")]);
    let descs = parse_attachment_list(&root).unwrap();
    hero.attachments_mut()
        .init_attachment_list(&descs, &mut StaticResolver, true);

    let frame = FrameContext::with_delta(1.0 / 30.0);
    for _ in 0..120 {
        hero.update(&frame);
    }

    let tail = hero.attachments().get_by_name("ponytail").unwrap();
    assert!(tail.add_transformation().is_equivalent(&QuatT::IDENTITY, 1.0e-4));
    let head = hero.skeleton_pose().joint_absolute(2).unwrap();
    let model = hero.attachments().attachment_model_transform(0).unwrap();
    assert!(model.t.abs_diff_eq(head.t, 1.0e-4));
}

#[test]
fn test_hidden_flag_survives_json_round_trip() {
    let mut hero = character();
    hero.attachments_mut()
        .create_attachment("hat", AttachmentType::Bone, "head")
        .unwrap();
    hero.attachments_mut()
        .get_mut(0)
        .unwrap()
        .hide_attachment(true);

    let json = serde_json::to_string(&hero.attachments().snapshot()).unwrap();
    let snapshot: AttachmentSnapshot = serde_json::from_str(&json).unwrap();

    let mut other = character();
    other
        .attachments_mut()
        .create_attachment("hat", AttachmentType::Bone, "head")
        .unwrap();
    assert_eq!(other.attachments_mut().restore(&snapshot), 1);
    assert!(other.attachments().get(0).unwrap().is_attachment_hidden());

    // 隐藏的挂点仍然参与更新
    other.update(&FrameContext::default());
    let hat = other.attachments().get(0).unwrap();
    assert!(hat.model_relative().t.abs_diff_eq(Vec3::ZERO, 1.0e-5));
}
