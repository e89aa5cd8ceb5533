//! 命令定义
//!
//! 每条命令都是小的 `Copy` 记录，按追加顺序执行。
//! 命令只引用缓冲区槽位与索引，不持有任何借用或堆内存。

use crate::animation::ClipId;

// ============================================================================
// 槽位与混合策略
// ============================================================================

/// 命令读写的缓冲区槽位
///
/// 两个槽位各有相对变换、状态与逐骨骼权重数组，缩放数组按需分配。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetBuffer {
    /// 最终累积结果（角色当前姿态）
    Target = 0,
    /// 单层采样的临时结果
    Tmp = 1,
}

/// 半球修正参考
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HemisphereReference {
    /// 与绑定姿态比较
    #[default]
    DefaultPose,
    /// 与当前累积结果比较
    Accumulation,
}

/// 层混合方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// 按权重插值
    Override,
    /// `slerp(I, delta, w) * base`
    Additive,
}

// ============================================================================
// 采样与混合
// ============================================================================

/// 清空槽位：相对变换置零、状态清空、权重清零
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearPoseBuffer {
    pub target: TargetBuffer,
}

/// 采样整段动画并按权重累加
///
/// 加法动画在这里与绑定姿态组合：`delta.q * default.q`，`delta.t + default.t`。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleAddAnimFull {
    pub clip: ClipId,
    /// 归一化时间 [0, 1]
    pub time: f32,
    pub weight: f32,
    pub target: TargetBuffer,
    pub hemisphere: HemisphereReference,
}

/// 采样部分身体动画，同时记录逐骨骼权重，加法动画保持原始增量
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleAddAnimPart {
    pub clip: ClipId,
    pub time: f32,
    pub weight: f32,
    pub target: TargetBuffer,
    pub hemisphere: HemisphereReference,
}

/// 归一化累加结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizeFull {
    pub target: TargetBuffer,
}

/// 统一缩放平移分量
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleUniformFull {
    pub target: TargetBuffer,
    pub scale: f32,
}

/// 把 Tmp 槽位按逐骨骼权重混合进 Target
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerJointBlending {
    pub mode: BlendMode,
    pub layer_weight: f32,
}

/// 本帧未写入的分量回退（绑定姿态或上一帧姿态）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApplyFallbackPose {
    pub target: TargetBuffer,
}

// ============================================================================
// 姿态后处理
// ============================================================================

/// 执行第 index 个姿态修改器
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunPoseModifier {
    pub index: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComputeAbsolutePose;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessAnimationDrivenIk;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncPhysics;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComputeBoundingBox;

/// 校验姿态（四元数单位长度、绝对变换一致）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerifyFull;

// ============================================================================
// 挂点
// ============================================================================

/// 由当前绝对姿态重新计算代理体模型空间变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrepareAllRedirectedTransformations;

/// 更新一个重定向骨骼挂点（attachment 为挂点索引）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateRedirectedJoint {
    pub attachment: u16,
}

/// 保存代理体上一帧变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerateProxyModelRelativeTransformations;

/// 更新一个骨骼链挂点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdatePendulumRow {
    pub attachment: u16,
}

// ============================================================================
// 命令
// ============================================================================

/// 命令记录
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    ClearPoseBuffer(ClearPoseBuffer),
    SampleAddAnimFull(SampleAddAnimFull),
    SampleAddAnimPart(SampleAddAnimPart),
    NormalizeFull(NormalizeFull),
    ScaleUniformFull(ScaleUniformFull),
    PerJointBlending(PerJointBlending),
    ApplyFallbackPose(ApplyFallbackPose),
    RunPoseModifier(RunPoseModifier),
    ComputeAbsolutePose(ComputeAbsolutePose),
    ProcessAnimationDrivenIk(ProcessAnimationDrivenIk),
    PrepareAllRedirectedTransformations(PrepareAllRedirectedTransformations),
    UpdateRedirectedJoint(UpdateRedirectedJoint),
    GenerateProxyModelRelativeTransformations(GenerateProxyModelRelativeTransformations),
    UpdatePendulumRow(UpdatePendulumRow),
    SyncPhysics(SyncPhysics),
    ComputeBoundingBox(ComputeBoundingBox),
    VerifyFull(VerifyFull),
}

macro_rules! impl_command_from {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for Command {
                #[inline]
                fn from(cmd: $name) -> Self {
                    Command::$name(cmd)
                }
            }
        )*
    };
}

impl_command_from!(
    ClearPoseBuffer,
    SampleAddAnimFull,
    SampleAddAnimPart,
    NormalizeFull,
    ScaleUniformFull,
    PerJointBlending,
    ApplyFallbackPose,
    RunPoseModifier,
    ComputeAbsolutePose,
    ProcessAnimationDrivenIk,
    PrepareAllRedirectedTransformations,
    UpdateRedirectedJoint,
    GenerateProxyModelRelativeTransformations,
    UpdatePendulumRow,
    SyncPhysics,
    ComputeBoundingBox,
    VerifyFull,
);
