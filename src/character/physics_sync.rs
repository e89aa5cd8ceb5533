use crate::math::{QuatT, QuatTS};

/// 物理同步
///
/// 接收每帧最终的骨骼绝对变换（模型空间）与角色世界位置，
/// 用于驱动外部物理系统中的刚体或布娃娃。
pub trait PhysicsSync: Send {
    fn sync(&mut self, absolute: &[QuatT], location: &QuatTS);
}
