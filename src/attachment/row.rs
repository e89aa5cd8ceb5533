//! 骨骼链摆锤（一排并列的摆锤，如裙摆）
//!
//! 行骨骼名中含 `_x00_`，把其后的两位计数递增即得到同一排的其余骨骼。
//! 每根骨骼是一个摆锤：沿骨骼 X 轴，长度为子骨骼默认平移的长度。
//! 相邻摆锤末端之间保持绑定姿态下的水平距离。

use glam::{Vec2, Vec3};

use crate::math::{rotation_arc, QuatT, QuatTS};
use crate::skeleton::{update_absolute_recursive, DefaultSkeleton, PoseData};

use super::base::AttachmentBase;
use super::proxy::Proxy;
use super::simulation::{clamp_row_direction, ClampType, ProjectionType, SimulationContext};

/// 每排最多骨骼数
pub const MAX_JOINTS_PER_ROW: usize = 32;

/// 子骨骼缺失时的默认摆长
const DEFAULT_ROD_LENGTH: f32 = 0.07;

/// 行模拟约束
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowClampMode {
    /// 仅投影，不积分
    #[default]
    TranslationalProjection,
    Cone,
    HingePlane,
    HalfCone,
}

impl RowClampMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => RowClampMode::Cone,
            2 => RowClampMode::HingePlane,
            3 => RowClampMode::HalfCone,
            _ => RowClampMode::TranslationalProjection,
        }
    }

    fn clamp_type(self) -> ClampType {
        match self {
            RowClampMode::TranslationalProjection => ClampType::TranslationalProjection,
            RowClampMode::Cone => ClampType::PendulumCone,
            RowClampMode::HingePlane => ClampType::PendulumHingePlane,
            RowClampMode::HalfCone => ClampType::PendulumHalfCone,
        }
    }
}

/// 行模拟参数
#[derive(Clone, Debug, PartialEq)]
pub struct RowSimulationParams {
    pub clamp_mode: RowClampMode,
    pub sim_fps: u8,
    /// 圆锥半角（度）
    pub cone_angle: f32,
    /// 圆锥/铰链平面旋转（度）
    pub cone_rotation: Vec3,
    pub mass: f32,
    pub gravity: f32,
    pub damping: f32,
    /// 回到绑定方向的弹簧系数
    pub joint_spring: f32,
    /// 摆长覆盖，0 表示使用子骨骼距离
    pub rod_length: f32,
    pub stiffness_target: Vec2,
    /// x: 振幅，y: 频率
    pub turbulence: Vec2,
    pub max_velocity: f32,
    /// 首尾相连
    pub cycle: bool,
    /// 水平距离松弛迭代次数
    pub relax_loops: u32,
    /// 水平距离允许的伸缩比例
    pub stretch: f32,
    pub capsule: Vec2,
    pub projection_type: ProjectionType,
    pub proxy_names: Vec<String>,
}

impl Default for RowSimulationParams {
    fn default() -> Self {
        Self {
            clamp_mode: RowClampMode::TranslationalProjection,
            sim_fps: 0,
            cone_angle: 45.0,
            cone_rotation: Vec3::ZERO,
            mass: 1.0,
            gravity: 9.81,
            damping: 1.0,
            joint_spring: 0.0,
            rod_length: 0.0,
            stiffness_target: Vec2::ZERO,
            turbulence: Vec2::ZERO,
            max_velocity: 8.0,
            cycle: false,
            relax_loops: 0,
            stretch: 0.1,
            capsule: Vec2::ZERO,
            projection_type: ProjectionType::None,
            proxy_names: Vec::new(),
        }
    }
}

/// 单个摆锤
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowParticle {
    pub joint_id: i32,
    pub child_id: i32,
    /// x: 到下一个摆锤末端的水平距离，y: 摆长
    pub distance: Vec2,
    position: Vec3,
    velocity: Vec3,
}

#[derive(Clone, Debug)]
pub struct PendulumRowAttachment {
    pub(crate) base: AttachmentBase,
    row_joint_name: String,
    pub(crate) joint_id: i32,
    pub params: RowSimulationParams,
    pub(crate) particles: Vec<RowParticle>,
    pub(crate) proxy_indices: Vec<usize>,
    accumulator: f32,
    initialized: bool,
}

impl PendulumRowAttachment {
    pub(crate) fn new(base: AttachmentBase, row_joint_name: &str) -> Self {
        Self {
            base,
            row_joint_name: row_joint_name.to_string(),
            joint_id: -1,
            params: RowSimulationParams::default(),
            particles: Vec::new(),
            proxy_indices: Vec::new(),
            accumulator: 0.0,
            initialized: false,
        }
    }

    #[inline]
    pub fn row_joint_name(&self) -> &str {
        &self.row_joint_name
    }

    #[inline]
    pub fn joint_id(&self) -> i32 {
        self.joint_id
    }

    #[inline]
    pub fn particles(&self) -> &[RowParticle] {
        &self.particles
    }

    /// 解析行骨骼，重建摆锤列表与静止距离
    pub(crate) fn rebuild(&mut self, skeleton: &DefaultSkeleton) {
        self.particles.clear();
        self.initialized = false;
        self.joint_id = skeleton.joint_id_by_name(&self.row_joint_name);
        if self.joint_id < 0 {
            log::warn!(
                "[Attachment] 骨骼链 '{}' 的行骨骼 '{}' 不存在",
                self.base.name(),
                self.row_joint_name
            );
            return;
        }

        let joints = row_joint_ids(&self.row_joint_name, skeleton);
        if joints.is_empty() {
            log::warn!("[Attachment] 行骨骼名 '{}' 不含 _x00_", self.row_joint_name);
            return;
        }

        let parents = skeleton.parents();
        for &id in &joints {
            let child_id = (id + 1..skeleton.joint_count())
                .find(|&i| parents[i] == id as i32)
                .map_or(-1, |i| i as i32);
            let rod = if child_id >= 0 {
                skeleton.default_relative(child_id as usize).t.length()
            } else {
                DEFAULT_ROD_LENGTH
            };
            self.particles.push(RowParticle {
                joint_id: id as i32,
                child_id,
                distance: Vec2::new(0.0, rod),
                ..Default::default()
            });
        }

        // 绑定姿态下末端之间的水平距离（最后一个与第一个相连）
        let n = self.particles.len();
        let tips: Vec<Vec3> = self
            .particles
            .iter()
            .map(|p| {
                let abs = skeleton.default_absolute(p.joint_id as usize);
                abs.q * Vec3::X * p.distance.y + abs.t
            })
            .collect();
        for i in 0..n {
            self.particles[i].distance.x = (tips[i] - tips[(i + 1) % n]).length();
        }
    }

    // ========================================
    // 模拟
    // ========================================

    /// 推进模拟并把摆锤方向写回骨骼
    pub(crate) fn update(
        &mut self,
        pose: &mut PoseData,
        skeleton: &DefaultSkeleton,
        proxies: &[Proxy],
        sim: &SimulationContext<'_>,
        turbulence_phase: f32,
    ) {
        if self.particles.is_empty() || !sim.config.attachment_simulation_enabled {
            return;
        }
        if self.particles.iter().any(|p| p.joint_id < 0 || p.joint_id as usize >= pose.joint_count()) {
            return;
        }

        let frames: Vec<QuatTS> = self
            .particles
            .iter()
            .map(|p| sim.location * pose.absolute(p.joint_id as usize))
            .collect();

        if !self.initialized {
            for (p, frame) in self.particles.iter_mut().zip(&frames) {
                p.position = frame.t + frame.q * Vec3::X * rod_length(&self.params, p) * frame.s;
                p.velocity = Vec3::ZERO;
            }
            self.accumulator = 0.0;
            self.initialized = true;
        }

        if self.params.clamp_mode != RowClampMode::TranslationalProjection {
            let fps = if self.params.sim_fps > 0 {
                self.params.sim_fps
            } else {
                sim.config.default_simulation_fps
            };
            let step = 1.0 / f32::from(fps.max(1));
            self.accumulator += sim.frame.delta_time.max(0.0);
            let max_steps = sim.config.max_simulation_substeps.max(1);
            let mut steps = (self.accumulator / step) as u32;
            if steps > max_steps {
                steps = max_steps;
                self.accumulator = 0.0;
            } else {
                self.accumulator -= steps as f32 * step;
            }
            for s in 0..steps {
                let phase = turbulence_phase + s as f32 * step;
                self.substep(&frames, step, phase, proxies, sim);
            }
        } else {
            // 只投影：末端跟随骨骼再推出代理
            for i in 0..self.particles.len() {
                let frame = &frames[i];
                let len = rod_length(&self.params, &self.particles[i]) * frame.s;
                let rest = frame.t + frame.q * Vec3::X * len;
                let pushed = self.project(rest, proxies, sim.location);
                self.particles[i].position = frame.t + (pushed - frame.t).normalize_or(frame.q * Vec3::X) * len;
            }
        }

        self.write_back(pose, skeleton, &frames);
    }

    fn substep(&mut self, frames: &[QuatTS], dt: f32, phase: f32, proxies: &[Proxy], sim: &SimulationContext<'_>) {
        let gravity = sim.config.gravity_direction * self.params.gravity;
        let inv_mass = 1.0 / self.params.mass.max(1.0e-3);
        let clamp = self.params.clamp_mode.clamp_type();
        let projection = self.params.projection_type;
        let relax_loops = self.params.relax_loops;
        let n = self.particles.len();
        let mut old = Vec::with_capacity(n);

        for i in 0..n {
            let p = &self.params;
            let frame = frames[i];
            let len = rod_length(p, &self.particles[i]) * frame.s;
            let rest_local = (Vec3::X + Vec3::new(0.0, p.stiffness_target.x, p.stiffness_target.y)).normalize_or(Vec3::X);
            let target = frame.t + frame.q * rest_local * len;
            let swirl = frame.q * Vec3::Z * (p.turbulence.x * (phase * p.turbulence.y + i as f32 * 0.5).sin());

            let particle = &mut self.particles[i];
            old.push(particle.position);
            let acc = gravity + swirl + (target - particle.position) * p.joint_spring * inv_mass;
            let mut v = particle.velocity + acc * dt;
            v *= (1.0 - p.damping * dt).clamp(0.0, 1.0);
            v = v.clamp_length_max(p.max_velocity.max(0.0));
            particle.position += v * dt;
        }

        for i in 0..n {
            if projection != ProjectionType::None {
                let pushed = self.project(self.particles[i].position, proxies, sim.location);
                self.particles[i].position = pushed;
            }
            self.constrain(i, &frames[i], clamp);
        }

        for _ in 0..relax_loops {
            self.relax_horizontal();
            for i in 0..n {
                self.constrain(i, &frames[i], clamp);
            }
        }

        for (particle, prev) in self.particles.iter_mut().zip(old) {
            particle.velocity = (particle.position - prev) / dt;
        }
    }

    /// 固定摆长并限制在圆锥内
    fn constrain(&mut self, i: usize, frame: &QuatTS, clamp: ClampType) {
        let len = rod_length(&self.params, &self.particles[i]) * frame.s;
        let particle = &mut self.particles[i];
        let dir = (particle.position - frame.t)
            .try_normalize()
            .unwrap_or(frame.q * Vec3::X);
        let local = clamp_row_direction(
            clamp,
            frame.q.inverse() * dir,
            self.params.cone_angle,
            self.params.cone_rotation,
        );
        particle.position = frame.t + frame.q * local * len;
    }

    /// 相邻末端间距限制在静止距离的 `1 ± stretch` 倍之内
    fn relax_horizontal(&mut self) {
        let n = self.particles.len();
        let pairs = if self.params.cycle { n } else { n.saturating_sub(1) };
        let stretch = self.params.stretch.max(0.0);
        for i in 0..pairs {
            let i1 = (i + 1) % n;
            if i1 == i {
                continue;
            }
            let rest = self.particles[i].distance.x;
            let d = self.particles[i1].position - self.particles[i].position;
            let len = d.length();
            if len < 1.0e-6 {
                continue;
            }
            let clamped = len.clamp(rest * (1.0 - stretch), rest * (1.0 + stretch));
            let correction = d * ((len - clamped) / len * 0.5);
            self.particles[i].position += correction;
            self.particles[i1].position -= correction;
        }
    }

    fn project(&self, mut position: Vec3, proxies: &[Proxy], location: QuatTS) -> Vec3 {
        for proxy in self.proxy_indices.iter().filter_map(|&i| proxies.get(i)) {
            let frame = location * proxy.model_relative;
            if let Some(pushed) = proxy.push_out(&frame, position, self.params.capsule.y) {
                position = pushed;
            }
        }
        position
    }

    fn write_back(&self, pose: &mut PoseData, skeleton: &DefaultSkeleton, frames: &[QuatTS]) {
        for (particle, frame) in self.particles.iter().zip(frames) {
            let j = particle.joint_id as usize;
            let local = (frame.q.inverse() * (particle.position - frame.t)).normalize_or(Vec3::X);
            let rel = pose.relative(j);
            pose.set_relative(j, QuatT::new((rel.q * rotation_arc(Vec3::X, local)).normalize(), rel.t));
            update_absolute_recursive(pose, skeleton, j);
        }
    }
}

#[inline]
fn rod_length(params: &RowSimulationParams, particle: &RowParticle) -> f32 {
    if params.rod_length > 0.0 {
        params.rod_length
    } else {
        particle.distance.y
    }
}

/// 按 `_x00_` 之后的两位计数枚举同一排的骨骼
pub(crate) fn row_joint_ids(row_joint_name: &str, skeleton: &DefaultSkeleton) -> Vec<usize> {
    let lower = row_joint_name.to_ascii_lowercase();
    let Some(pos) = lower.find("_x00_") else {
        return Vec::new();
    };
    let mut name = row_joint_name.as_bytes().to_vec();
    let digit = pos + 2;
    let mut ids = Vec::new();
    while ids.len() < MAX_JOINTS_PER_ROW {
        let Ok(candidate) = std::str::from_utf8(&name) else {
            break;
        };
        let id = skeleton.joint_id_by_name(candidate);
        if id < 0 {
            break;
        }
        ids.push(id as usize);
        name[digit + 1] += 1;
        if name[digit + 1] > b'9' {
            name[digit] += 1;
            name[digit + 1] = b'0';
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnimationConfig, FrameContext};
    use crate::skeleton::JointDesc;
    use glam::Quat;

    /// 根骨骼下一排三根裙摆骨骼，各带一根子骨骼
    fn skirt() -> DefaultSkeleton {
        let mut descs = vec![JointDesc::new("pelvis", -1, QuatT::IDENTITY)];
        for i in 0..3 {
            let angle = i as f32 * 0.5;
            let parent = descs.len() as i32;
            descs.push(JointDesc::new(
                format!("skirt_x0{}_y00", i),
                0,
                QuatT::new(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2) * Quat::from_rotation_x(angle), Vec3::new(angle, 0.0, 0.0)),
            ));
            descs.push(JointDesc::new(
                format!("skirt_x0{}_y01", i),
                parent,
                QuatT::from_translation(Vec3::X * 0.2),
            ));
        }
        DefaultSkeleton::build(&descs).unwrap()
    }

    #[test]
    fn test_row_joint_enumeration() {
        let skel = skirt();
        assert_eq!(row_joint_ids("Skirt_X00_y00", &skel), vec![1, 3, 5]);
        assert!(row_joint_ids("skirt_y00", &skel).is_empty());
    }

    #[test]
    fn test_rebuild_distances() {
        let skel = skirt();
        let mut row = PendulumRowAttachment::new(AttachmentBase::new("skirt").unwrap(), "skirt_x00_y00");
        row.rebuild(&skel);
        assert_eq!(row.particles().len(), 3);
        assert_eq!(row.particles()[0].child_id, 2);
        assert!((row.particles()[0].distance.y - 0.2).abs() < 1.0e-5);
        assert!(row.particles().iter().all(|p| p.distance.x > 0.0));
    }

    #[test]
    fn test_update_keeps_pose_consistent() {
        let skel = skirt();
        let mut row = PendulumRowAttachment::new(AttachmentBase::new("skirt").unwrap(), "skirt_x00_y00");
        row.params.clamp_mode = RowClampMode::Cone;
        row.params.cone_angle = 20.0;
        row.params.relax_loops = 2;
        row.rebuild(&skel);

        let config = AnimationConfig::default();
        let frame = FrameContext::with_delta(1.0 / 30.0);
        let sim = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        let mut pose = PoseData::from_default(&skel);
        for _ in 0..10 {
            row.update(&mut pose, &skel, &[], &sim, 0.0);
        }
        assert!(pose.validate(skel.parents(), 1.0e-3));
    }
}
