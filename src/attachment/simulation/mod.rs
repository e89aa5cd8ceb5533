//! 挂点次级运动模拟
//!
//! 摆锤与弹簧在世界空间按固定步长积分，帧时间不足一步的部分累积到下一帧。
//! 模拟结果是一个附加变换，叠加在动画给出的挂点变换之上：
//! `最终 = model_relative * add`。平移投影不积分，每帧直接求解。

mod clamp;
mod params;

pub use params::{ClampType, ProjectionType, SimulationParams, MAX_SIMULATION_PROXIES};

use glam::{EulerRot, Quat, Vec3};

use crate::config::{AnimationConfig, FrameContext};
use crate::math::{rotation_arc, QuatT, QuatTS};
use crate::skeleton::PoseData;

use super::proxy::Proxy;
use clamp::{clamp_direction, clamp_ellipsoid};

/// 骨骼链摆锤的方向约束：圆锥轴为按 `rotation_deg` 旋转后的 X 轴
pub(crate) fn clamp_row_direction(clamp: ClampType, dir: Vec3, cone_angle_deg: f32, rotation_deg: Vec3) -> Vec3 {
    let rot = Quat::from_euler(
        EulerRot::XYZ,
        rotation_deg.x.to_radians(),
        rotation_deg.y.to_radians(),
        rotation_deg.z.to_radians(),
    );
    clamp_direction(clamp, dir, rot * Vec3::X, cone_angle_deg, 0.0)
}

/// 模拟所需的每帧输入
#[derive(Clone, Copy, Debug)]
pub struct SimulationContext<'a> {
    pub config: &'a AnimationConfig,
    pub frame: &'a FrameContext,
    /// 角色世界位置
    pub location: QuatTS,
}

/// 积分状态
#[derive(Clone, Debug, Default)]
struct SimulationState {
    initialized: bool,
    /// 摆锤末端或弹簧质点的世界位置
    position: Vec3,
    velocity: Vec3,
    /// 未满一步的剩余时间
    accumulator: f32,
}

/// 单个挂点的模拟器
#[derive(Clone, Debug)]
pub struct Simulation {
    pub params: SimulationParams,
    /// 已解析的碰撞代理索引
    pub(crate) proxy_indices: Vec<usize>,
    /// 重定向时需要重算绝对变换的子孙骨骼（升序）
    pub(crate) redirect_children: Vec<usize>,
    /// 权重骨骼：其相对平移 x 分量缩放模拟结果
    pub(crate) anim_override_joint: i32,
    /// 方向投影参考骨骼
    pub(crate) dir_trans_joint: i32,
    state: SimulationState,
    add: QuatT,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationParams::default())
    }
}

impl Simulation {
    pub fn new(params: SimulationParams) -> Self {
        Self {
            params,
            proxy_indices: Vec::new(),
            redirect_children: Vec::new(),
            anim_override_joint: -1,
            dir_trans_joint: -1,
            state: SimulationState::default(),
            add: QuatT::IDENTITY,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.params.clamp_type != ClampType::Disabled
    }

    /// 最近一次计算的附加变换
    #[inline]
    pub fn additional_transform(&self) -> QuatT {
        self.add
    }

    #[inline]
    pub fn redirect_children(&self) -> &[usize] {
        &self.redirect_children
    }

    #[inline]
    pub fn proxy_indices(&self) -> &[usize] {
        &self.proxy_indices
    }

    /// 丢弃积分状态，下次更新从静止位置重新开始
    pub fn reset(&mut self) {
        self.state = SimulationState::default();
        self.add = QuatT::IDENTITY;
    }

    /// 推进模拟并返回附加变换
    ///
    /// `model_relative` 为动画驱动的挂点模型空间变换。
    pub(crate) fn update(
        &mut self,
        model_relative: QuatT,
        pose: &PoseData,
        proxies: &[Proxy],
        sim: &SimulationContext<'_>,
    ) -> QuatT {
        if !self.is_enabled() || !sim.config.attachment_simulation_enabled {
            self.reset();
            return QuatT::IDENTITY;
        }

        let add = if self.params.clamp_type == ClampType::TranslationalProjection {
            self.translational_projection(model_relative, pose, proxies, sim)
        } else {
            self.integrate(model_relative, proxies, sim)
        };

        self.add = self.apply_override_weight(add, pose);
        self.add
    }

    // ========================================
    // 积分
    // ========================================

    fn integrate(&mut self, model_relative: QuatT, proxies: &[Proxy], sim: &SimulationContext<'_>) -> QuatT {
        let world = sim.location * model_relative;
        let pivot = world.transform_point(self.params.pivot_offset);
        let step = 1.0 / self.params.effective_fps(sim.config.default_simulation_fps);

        if !self.state.initialized {
            self.state = SimulationState {
                initialized: true,
                position: self.rest_position(&world, pivot),
                velocity: Vec3::ZERO,
                accumulator: 0.0,
            };
        }

        self.state.accumulator += sim.frame.delta_time.max(0.0);
        let max_steps = sim.config.max_simulation_substeps.max(1);
        let mut steps = (self.state.accumulator / step) as u32;
        if steps > max_steps {
            // 长帧丢弃多余时间
            steps = max_steps;
            self.state.accumulator = 0.0;
        } else {
            self.state.accumulator -= steps as f32 * step;
        }

        for _ in 0..steps {
            self.substep(&world, pivot, step, proxies, sim);
        }

        self.current_transform(&world, pivot)
    }

    fn rest_position(&self, world: &QuatTS, pivot: Vec3) -> Vec3 {
        if self.params.clamp_type.is_pendulum() {
            pivot + world.q * self.params.axis_direction() * self.params.rod_length() * world.s
        } else {
            pivot
        }
    }

    /// 刚度目标在垂直于模拟轴平面内的局部偏移
    fn stiffness_offset(&self) -> Vec3 {
        let axis = self.params.axis_direction();
        let u = axis.any_orthonormal_vector();
        let v = axis.cross(u);
        u * self.params.stiffness_target.x + v * self.params.stiffness_target.y
    }

    fn substep(&mut self, world: &QuatTS, pivot: Vec3, dt: f32, proxies: &[Proxy], sim: &SimulationContext<'_>) {
        let p = &self.params;
        let pendulum = p.clamp_type.is_pendulum();
        let axis = p.axis_direction();
        let length = p.rod_length() * world.s;

        let target = if pendulum {
            pivot + world.q * (axis + self.stiffness_offset()).normalize_or(axis) * length
        } else {
            pivot + world.q * self.stiffness_offset() * world.s
        };

        let old = self.state.position;
        let inv_mass = 1.0 / p.mass.max(1.0e-3);
        let acc = sim.config.gravity_direction * p.gravity + (target - old) * p.stiffness * inv_mass;
        let mut velocity = self.state.velocity + acc * dt;
        velocity *= (1.0 - p.damping * dt).clamp(0.0, 1.0);
        let mut position = old + velocity * dt;

        if p.projection_type != ProjectionType::None {
            position = self.project_out_of_proxies(position, proxies, sim.location);
        }

        if pendulum {
            let dir = (position - pivot)
                .try_normalize()
                .unwrap_or_else(|| world.q * axis);
            let local = clamp_direction(
                p.clamp_type,
                world.q.inverse() * dir,
                axis,
                p.max_angle,
                p.disk_rotation.x,
            );
            position = pivot + world.q * local * length;
        } else {
            let scale = world.s.max(1.0e-6);
            let offset = world.q.inverse() * (position - pivot) / scale;
            let offset = clamp_ellipsoid(offset, p.radius, p.sphere_scale, p.disk_rotation);
            position = pivot + world.q * offset * scale;
        }

        self.state.position = position;
        self.state.velocity = (position - old) / dt;
    }

    /// 质点按胶囊半径推出全部代理
    fn project_out_of_proxies(&self, mut position: Vec3, proxies: &[Proxy], location: QuatTS) -> Vec3 {
        let radius = self.params.capsule.y;
        for proxy in self.proxy_indices.iter().filter_map(|&i| proxies.get(i)) {
            let frame = location * proxy.model_relative;
            if let Some(pushed) = proxy.push_out(&frame, position, radius) {
                position = pushed;
            }
        }
        position
    }

    fn current_transform(&self, world: &QuatTS, pivot: Vec3) -> QuatT {
        let p = &self.params;
        if p.clamp_type.is_pendulum() {
            let axis = p.axis_direction();
            let local = (world.q.inverse() * (self.state.position - pivot))
                .try_normalize()
                .unwrap_or(axis);
            // 绕支点旋转
            let q = rotation_arc(axis, local);
            QuatT::new(q, p.pivot_offset - q * p.pivot_offset)
        } else {
            let offset = world.q.inverse() * (self.state.position - pivot) / world.s.max(1.0e-6);
            QuatT::from_translation(offset)
        }
    }

    // ========================================
    // 平移投影
    // ========================================

    fn translational_projection(
        &self,
        model_relative: QuatT,
        pose: &PoseData,
        proxies: &[Proxy],
        sim: &SimulationContext<'_>,
    ) -> QuatT {
        let p = &self.params;
        let world = sim.location * model_relative;
        let point = world.transform_point(p.pivot_offset);

        let direction = match p.projection_type {
            ProjectionType::None => return QuatT::IDENTITY,
            ProjectionType::ShortestVector => Vec3::ZERO,
            ProjectionType::DirectedTranslation => {
                let j = self.dir_trans_joint;
                if j >= 0 && (j as usize) < pose.joint_count() {
                    sim.location.q * (model_relative.t - pose.absolute(j as usize).t)
                } else {
                    world.q * p.axis_direction()
                }
            }
        };

        let mut projected = point;
        for proxy in self.proxy_indices.iter().filter_map(|&i| proxies.get(i)) {
            let frame = sim.location * proxy.model_relative;
            let pushed = if direction == Vec3::ZERO {
                proxy.push_out(&frame, projected, p.capsule.y)
            } else {
                proxy.push_out_directed(&frame, projected, direction, p.capsule.y)
            };
            if let Some(x) = pushed {
                projected = x;
            }
        }

        let offset = world.q.inverse() * (projected - point) / world.s.max(1.0e-6);
        QuatT::from_translation(offset)
    }

    /// 权重骨骼缩放附加变换
    fn apply_override_weight(&self, add: QuatT, pose: &PoseData) -> QuatT {
        let j = self.anim_override_joint;
        if j < 0 || j as usize >= pose.joint_count() {
            return add;
        }
        let w = pose.relative(j as usize).t.x.clamp(0.0, 1.0);
        QuatT::IDENTITY.nlerp(&add, w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{DefaultSkeleton, JointDesc};
    use glam::Vec4;
    use test_case::test_case;

    fn single_joint_pose() -> PoseData {
        let skeleton = DefaultSkeleton::build(&[JointDesc::new("root", -1, QuatT::IDENTITY)]).unwrap();
        PoseData::from_default(&skeleton)
    }

    fn run(sim: &mut Simulation, frames: usize, location: QuatTS) -> QuatT {
        let config = AnimationConfig::default();
        let frame = FrameContext::with_delta(1.0 / 30.0);
        let pose = single_joint_pose();
        let ctx = SimulationContext {
            config: &config,
            frame: &frame,
            location,
        };
        let mut add = QuatT::IDENTITY;
        for _ in 0..frames {
            add = sim.update(QuatT::IDENTITY, &pose, &[], &ctx);
        }
        add
    }

    #[test_case(ClampType::PendulumCone)]
    #[test_case(ClampType::PendulumHingePlane)]
    #[test_case(ClampType::PendulumHalfCone)]
    #[test_case(ClampType::SpringEllipsoid)]
    fn test_no_forces_stays_at_rest(clamp: ClampType) {
        // 无重力无刚度时附加变换保持单位
        let mut sim = Simulation::new(SimulationParams {
            clamp_type: clamp,
            gravity: 0.0,
            stiffness: 0.0,
            ..Default::default()
        });
        let add = run(&mut sim, 60, QuatTS::IDENTITY);
        assert!(add.is_equivalent(&QuatT::IDENTITY, 1.0e-4));
    }

    #[test]
    fn test_pendulum_swings_under_gravity_within_cone() {
        // 摆锤沿 Y 轴水平放置，重力向 -Z
        let mut sim = Simulation::new(SimulationParams {
            clamp_type: ClampType::PendulumCone,
            max_angle: 30.0,
            ..Default::default()
        });
        let add = run(&mut sim, 90, QuatTS::IDENTITY);
        let dir = add.q * Vec3::Y;
        let angle = dir.dot(Vec3::Y).clamp(-1.0, 1.0).acos().to_degrees();
        assert!(angle > 1.0);
        assert!(angle <= 30.0 + 1.0e-2);
        assert!(dir.z < 0.0);
    }

    #[test]
    fn test_disabled_returns_identity() {
        let mut sim = Simulation::default();
        let add = run(&mut sim, 3, QuatTS::IDENTITY);
        assert_eq!(add, QuatT::IDENTITY);
    }

    #[test]
    fn test_substep_accumulator() {
        let mut config = AnimationConfig::default();
        config.default_simulation_fps = 30;
        let pose = single_joint_pose();
        // 半步时间不触发积分
        let frame = FrameContext::with_delta(0.6 / 30.0);
        let ctx = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        let mut sim = Simulation::new(SimulationParams {
            clamp_type: ClampType::SpringEllipsoid,
            ..Default::default()
        });
        let first = sim.update(QuatT::IDENTITY, &pose, &[], &ctx);
        assert_eq!(first, QuatT::IDENTITY);
        let second = sim.update(QuatT::IDENTITY, &pose, &[], &ctx);
        assert!(second.t.z < 0.0);
    }

    #[test]
    fn test_translational_projection_pushes_out() {
        let config = AnimationConfig::default();
        let frame = FrameContext::default();
        let pose = single_joint_pose();
        let ctx = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        let mut proxy = Proxy::new("ball", "root", QuatT::IDENTITY, Vec4::new(0.0, 0.0, 0.0, 0.5), 1);
        proxy.project(QuatT::IDENTITY);
        let mut sim = Simulation::new(SimulationParams {
            clamp_type: ClampType::TranslationalProjection,
            projection_type: ProjectionType::ShortestVector,
            ..Default::default()
        });
        sim.proxy_indices = vec![0];
        let model = QuatT::new(Quat::IDENTITY, Vec3::new(0.2, 0.0, 0.0));
        let add = sim.update(model, &pose, std::slice::from_ref(&proxy), &ctx);
        let final_pos = (model * add).t;
        assert!((final_pos.length() - 0.5).abs() < 1.0e-4);
    }
}
