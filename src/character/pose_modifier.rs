use crate::config::FrameContext;
use crate::skeleton::{DefaultSkeleton, PoseData};

/// 姿态修改器
///
/// 在动画采样之后、绝对姿态计算之前修改相对姿态（看向目标、手动调整骨骼等）。
/// 由 `RunPoseModifier` 命令按注册顺序调用。
pub trait PoseModifier: Send {
    /// 返回是否修改了姿态
    fn execute(&mut self, pose: &mut PoseData, skeleton: &DefaultSkeleton, frame: &FrameContext) -> bool;
}
