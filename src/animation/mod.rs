//! 动画系统
//!
//! - AnimationClip / AnimationSet: 关键帧数据
//! - LayerQueue: 单层过渡队列
//! - SkeletonAnim: 多层调度，生成采样命令

mod animation_set;
mod clip;
mod layer_queue;
mod params;
mod skeleton_anim;

pub use animation_set::{AnimationSet, ClipId};
pub use clip::{AnimationClip, JointTrack, TrackSample};
pub use layer_queue::{LayerQueue, QueuedAnimation};
pub use params::{AnimFlags, AnimParams};
pub use skeleton_anim::{SkeletonAnim, NUM_LAYERS};
