//! 模拟参数

use glam::{Vec2, Vec3};

/// 碰撞代理名称列表上限
pub const MAX_SIMULATION_PROXIES: usize = 10;

/// 模拟类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClampType {
    #[default]
    Disabled,
    /// 圆锥约束摆锤
    PendulumCone,
    /// 铰链平面约束摆锤
    PendulumHingePlane,
    /// 半圆锥约束摆锤
    PendulumHalfCone,
    /// 椭球约束弹簧
    SpringEllipsoid,
    /// 仅做平移投影，不积分
    TranslationalProjection,
}

impl ClampType {
    /// `PA_PendulumType` 的取值 1..=3
    pub fn from_pendulum_type(value: u32) -> Option<Self> {
        match value {
            1 => Some(ClampType::PendulumCone),
            2 => Some(ClampType::PendulumHingePlane),
            3 => Some(ClampType::PendulumHalfCone),
            _ => None,
        }
    }

    #[inline]
    pub fn is_pendulum(self) -> bool {
        matches!(
            self,
            ClampType::PendulumCone | ClampType::PendulumHingePlane | ClampType::PendulumHalfCone
        )
    }

    /// 需要按时间积分
    #[inline]
    pub fn is_dynamic(self) -> bool {
        self.is_pendulum() || self == ClampType::SpringEllipsoid
    }
}

/// 代理投影方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProjectionType {
    #[default]
    None,
    /// 沿最短向量推出
    ShortestVector,
    /// 沿指定方向推出
    DirectedTranslation,
}

impl ProjectionType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => ProjectionType::ShortestVector,
            2 => ProjectionType::DirectedTranslation,
            _ => ProjectionType::None,
        }
    }
}

/// 单个挂点的次级运动参数
///
/// 角度以度为单位保存，与定义文件一致。
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParams {
    pub clamp_type: ClampType,
    /// 模拟结果写回骨骼（重定向挂点）
    pub use_redirect: bool,
    /// 模拟帧率，0 表示使用配置默认值
    pub sim_fps: u8,
    /// 圆锥半角（度）
    pub max_angle: f32,
    /// x: 铰链平面绕模拟轴的旋转（度）；弹簧时为椭球绕 X/Z 的旋转
    pub disk_rotation: Vec2,
    pub mass: f32,
    pub gravity: f32,
    pub damping: f32,
    pub stiffness: f32,
    /// 摆动支点相对挂点的偏移
    pub pivot_offset: Vec3,
    /// 摆锤方向与长度
    pub simulation_axis: Vec3,
    /// 刚度目标在垂直于模拟轴平面内的偏移
    pub stiffness_target: Vec2,
    /// x: 胶囊半长，y: 胶囊半径
    pub capsule: Vec2,
    pub projection_type: ProjectionType,
    /// 方向投影参考骨骼
    pub dir_trans_joint: String,
    pub proxy_names: Vec<String>,
    /// 过程函数名，仅保存
    pub proc_function: String,
    /// 弹簧椭球半径
    pub radius: f32,
    /// 弹簧椭球 z 正/负半轴缩放
    pub sphere_scale: Vec2,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            clamp_type: ClampType::Disabled,
            use_redirect: false,
            sim_fps: 0,
            max_angle: 45.0,
            disk_rotation: Vec2::ZERO,
            mass: 1.0,
            gravity: 9.81,
            damping: 1.0,
            stiffness: 0.0,
            pivot_offset: Vec3::ZERO,
            simulation_axis: Vec3::new(0.0, 0.5, 0.0),
            stiffness_target: Vec2::ZERO,
            capsule: Vec2::ZERO,
            projection_type: ProjectionType::None,
            dir_trans_joint: String::new(),
            proxy_names: Vec::new(),
            proc_function: String::new(),
            radius: 0.5,
            sphere_scale: Vec2::ONE,
        }
    }
}

impl SimulationParams {
    /// 摆锤方向（局部空间单位向量）
    pub fn axis_direction(&self) -> Vec3 {
        self.simulation_axis.try_normalize().unwrap_or(Vec3::Y)
    }

    /// 摆锤长度
    pub fn rod_length(&self) -> f32 {
        let len = self.simulation_axis.length();
        if len > 1.0e-4 {
            len
        } else {
            0.5
        }
    }

    /// 实际使用的模拟帧率
    pub fn effective_fps(&self, default_fps: u8) -> f32 {
        let fps = if self.sim_fps > 0 { self.sim_fps } else { default_fps };
        f32::from(fps.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pendulum_type_mapping() {
        assert_eq!(ClampType::from_pendulum_type(2), Some(ClampType::PendulumHingePlane));
        assert_eq!(ClampType::from_pendulum_type(0), None);
        assert!(ClampType::PendulumHalfCone.is_pendulum());
        assert!(!ClampType::TranslationalProjection.is_dynamic());
    }

    #[test]
    fn test_effective_fps() {
        let mut p = SimulationParams::default();
        assert_eq!(p.effective_fps(30), 30.0);
        p.sim_fps = 60;
        assert_eq!(p.effective_fps(30), 60.0);
    }
}
