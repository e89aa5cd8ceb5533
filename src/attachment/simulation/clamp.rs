//! 摆锤方向与弹簧位移的约束

use glam::{Quat, Vec2, Vec3};

use super::params::ClampType;

/// 铰链平面法线：模拟轴的任一正交向量绕模拟轴旋转 `rotation_deg`
pub(crate) fn hinge_normal(axis: Vec3, rotation_deg: f32) -> Vec3 {
    Quat::from_axis_angle(axis, rotation_deg.to_radians()) * axis.any_orthonormal_vector()
}

/// 限制方向与轴的夹角不超过 `max_angle`（弧度）
pub(crate) fn clamp_cone(dir: Vec3, axis: Vec3, max_angle: f32) -> Vec3 {
    let cos = dir.dot(axis).clamp(-1.0, 1.0);
    if cos.acos() <= max_angle {
        return dir;
    }
    let rot_axis = axis
        .cross(dir)
        .try_normalize()
        .unwrap_or_else(|| axis.any_orthonormal_vector());
    Quat::from_axis_angle(rot_axis, max_angle) * axis
}

/// 投影到法线为 `normal` 的平面上
fn project_to_plane(dir: Vec3, normal: Vec3, axis: Vec3) -> Vec3 {
    (dir - normal * dir.dot(normal)).try_normalize().unwrap_or(axis)
}

/// 按约束类型修正局部空间摆锤方向
pub(crate) fn clamp_direction(
    clamp: ClampType,
    dir: Vec3,
    axis: Vec3,
    max_angle_deg: f32,
    hinge_rotation_deg: f32,
) -> Vec3 {
    let max_angle = max_angle_deg.to_radians().max(0.0);
    match clamp {
        ClampType::PendulumCone => clamp_cone(dir, axis, max_angle),
        ClampType::PendulumHingePlane => {
            let n = hinge_normal(axis, hinge_rotation_deg);
            clamp_cone(project_to_plane(dir, n, axis), axis, max_angle)
        }
        ClampType::PendulumHalfCone => {
            let n = hinge_normal(axis, hinge_rotation_deg);
            let d = clamp_cone(dir, axis, max_angle);
            if d.dot(n) < 0.0 {
                project_to_plane(d, n, axis)
            } else {
                d
            }
        }
        _ => dir,
    }
}

/// 把弹簧位移限制在椭球内
///
/// 椭球先按 `rotation_deg`（绕 X、绕 Z）旋转；z 正负半轴分别按 `scale` 缩放。
pub(crate) fn clamp_ellipsoid(offset: Vec3, radius: f32, scale: Vec2, rotation_deg: Vec2) -> Vec3 {
    if radius <= 0.0 {
        return Vec3::ZERO;
    }
    let rot = Quat::from_rotation_x(rotation_deg.x.to_radians()) * Quat::from_rotation_z(rotation_deg.y.to_radians());
    let e = rot.inverse() * offset;
    let z_scale = if e.z >= 0.0 { scale.x } else { scale.y };
    let rz = radius * z_scale.max(1.0e-4);
    let k = Vec3::new(e.x / radius, e.y / radius, e.z / rz).length();
    if k <= 1.0 {
        return offset;
    }
    rot * (e / k)
}
