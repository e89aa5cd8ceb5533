//! 角色骨骼动画运行时
//!
//! 每帧流程：
//! - `SkeletonAnim` 根据各层动画队列决定采样内容
//! - `CommandBuffer` 记录计算步骤并一次性执行，写入 `PoseData`
//! - `AttachmentManager` 读取绝对姿态，更新挂点、次级运动模拟与子角色
//! - `ContextQueue` 按父先子后的顺序调度整个角色层级

pub mod animation;
pub mod attachment;
pub mod character;
pub mod command;
pub mod config;
pub mod error;
pub mod math;
pub mod skeleton;

pub use animation::{AnimFlags, AnimParams, AnimationClip, AnimationSet, ClipId, SkeletonAnim};
pub use attachment::{
    Attachment, AttachmentFlags, AttachmentManager, AttachmentObject, AttachmentType,
    BindingResolver, CharacterAttachmentDesc,
};
pub use character::{CharacterArena, CharacterId, CharacterInstance, ContextQueue, PhysicsSync, PoseModifier};
pub use command::{Command, CommandBuffer, TargetBuffer};
pub use config::{AnimationConfig, FrameContext};
pub use error::{AnimError, Result};
pub use math::{Aabb, QuatT, QuatTS};
pub use skeleton::{DefaultSkeleton, JointDesc, JointStatus, PoseData, SkeletonPose};
