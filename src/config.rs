//! 动画配置
//!
//! 所有参数扁平化。配置通过更新调用链显式传递，不使用全局变量。

use glam::Vec3;

use crate::command::HemisphereReference;

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AnimationConfig {
    // ========== 姿态回退 ==========
    /// 本帧未被写入的骨骼回退到绑定姿态（true）还是上一帧姿态（false），默认 true
    pub reset_culled_joints_to_bind_pose: bool,

    // ========== 混合 ==========
    /// 四元数累加时半球修正的参考，默认使用默认姿态
    pub hemisphere_reference: HemisphereReference,
    /// 归一化阈值，累加四元数的自点积低于此值时重置为单位四元数，默认 1e-6
    pub normalize_epsilon: f32,

    // ========== 功能开关 ==========
    /// 是否采样动画，默认 true
    pub sampling_enabled: bool,
    /// 是否执行动画驱动 IK，默认 true
    pub ik_enabled: bool,
    /// 是否执行姿态修改器，默认 true
    pub pose_modifiers_enabled: bool,
    /// 是否执行挂点次级运动模拟，默认 true
    pub attachment_simulation_enabled: bool,
    /// 是否在命令流末尾校验姿态（四元数单位长度），默认仅调试构建开启
    pub verify_pose: bool,

    // ========== 挂点 ==========
    /// 静态挂点可见性判定：物体半径 * 该比率 的平方与缩放后的距离平方比较，默认 120.0
    pub attachment_culling_ratio: f32,
    /// 子角色变更日志环形队列容量，默认 64
    pub attached_cache_capacity: usize,

    // ========== 模拟 ==========
    /// 挂点模拟每帧最大子步数，默认 5
    pub max_simulation_substeps: u32,
    /// 定义中未给出 FPS 时的模拟帧率，默认 30
    pub default_simulation_fps: u8,
    /// 重力方向（单位向量，Z 轴向上），默认 (0, 0, -1)
    pub gravity_direction: Vec3,

    // ========== 调度 ==========
    /// 同一层级的角色是否并行处理，默认 true
    pub parallel_processing: bool,

    // ========== 调试 ==========
    /// 是否输出资源警告日志，默认 true
    pub log_content_warnings: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            reset_culled_joints_to_bind_pose: true,

            hemisphere_reference: HemisphereReference::DefaultPose,
            normalize_epsilon: 1.0e-6,

            sampling_enabled: true,
            ik_enabled: true,
            pose_modifiers_enabled: true,
            attachment_simulation_enabled: true,
            verify_pose: cfg!(debug_assertions),

            // 与距离平方比较，数值越大越晚剔除
            attachment_culling_ratio: 120.0,
            attached_cache_capacity: 64,

            max_simulation_substeps: 5,
            default_simulation_fps: 30,
            gravity_direction: Vec3::new(0.0, 0.0, -1.0),

            parallel_processing: true,

            log_content_warnings: true,
        }
    }
}

/// 单帧输入
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// 帧时间（秒）
    pub delta_time: f32,
    /// 摄像机到角色的距离平方
    pub zoom_distance_sq: f32,
    /// 视野缩放因子
    pub zoom_factor: f32,
    /// 动画 LOD（0 为最高）
    pub animation_lod: u32,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            delta_time: 1.0 / 30.0,
            zoom_distance_sq: 0.0,
            zoom_factor: 1.0,
            animation_lod: 0,
        }
    }
}

impl FrameContext {
    /// 以给定帧时间创建
    pub fn with_delta(delta_time: f32) -> Self {
        Self {
            delta_time,
            ..Self::default()
        }
    }
}
