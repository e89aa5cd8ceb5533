//! 骨骼系统
//!
//! - DefaultSkeleton: 共享的骨骼层次与绑定姿态
//! - PoseData: 单个实例的逐骨骼变换数组
//! - SkeletonPose: 当前姿态 + 绑定姿态，控制每帧唯一可写目标
//! - IkChain: 动画驱动 IK

mod default_skeleton;
mod ik_solver;
mod joint;
mod pose_data;
mod skeleton_pose;

pub use default_skeleton::DefaultSkeleton;
pub use ik_solver::{IkChain, IkLink};
pub use joint::{Joint, JointDesc, JointStatus};
pub use pose_data::PoseData;
pub use skeleton_pose::SkeletonPose;

pub(crate) use ik_solver::update_absolute_recursive;
