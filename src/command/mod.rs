//! 姿态计算命令
//!
//! 动画调度与挂点系统把本帧要做的计算记录为命令，
//! 由 `CommandBuffer::execute` 在一次调用中按顺序执行。

pub mod blend;
mod buffer;
mod commands;

pub use buffer::{CommandBuffer, CommandContext};
pub use commands::{
    ApplyFallbackPose, BlendMode, ClearPoseBuffer, Command, ComputeAbsolutePose,
    ComputeBoundingBox, GenerateProxyModelRelativeTransformations, HemisphereReference,
    NormalizeFull, PerJointBlending, PrepareAllRedirectedTransformations, ProcessAnimationDrivenIk,
    RunPoseModifier, SampleAddAnimFull, SampleAddAnimPart, ScaleUniformFull, SyncPhysics,
    TargetBuffer, UpdatePendulumRow, UpdateRedirectedJoint, VerifyFull,
};
