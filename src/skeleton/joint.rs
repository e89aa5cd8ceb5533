//! 骨骼节点
//!
//! 骨骼用扁平数组中的整数索引标识，父索引 -1 表示根骨骼。
//! 索引 0 永远是根，且父索引总小于自身索引。

use bitflags::bitflags;

use crate::math::{crc32_lowercase, QuatT};

// ============================================================================
// 骨骼状态
// ============================================================================

bitflags! {
    /// 本帧实际写入了哪些分量
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct JointStatus: u8 {
        /// 写入了旋转
        const ORIENTATION = 1 << 0;
        /// 写入了平移
        const POSITION = 1 << 1;
        /// 写入了缩放
        const SCALE = 1 << 2;
    }
}

// ============================================================================
// 骨骼描述
// ============================================================================

/// 构建骨架用的骨骼描述
#[derive(Clone, Debug)]
pub struct JointDesc {
    /// 骨骼名称
    pub name: String,
    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent: i32,
    /// 绑定姿态下相对父骨骼的变换
    pub relative: QuatT,
}

impl JointDesc {
    pub fn new(name: impl Into<String>, parent: i32, relative: QuatT) -> Self {
        Self {
            name: name.into(),
            parent,
            relative,
        }
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨架中的单个骨骼（静态数据，初始化后不变）
#[derive(Clone, Debug)]
pub struct Joint {
    /// 骨骼名称
    pub name: String,
    /// 小写名称的 CRC32
    pub name_crc: u32,
    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent: i32,
    /// 绑定姿态相对变换
    pub default_relative: QuatT,
    /// 绑定姿态绝对变换（构建时计算）
    pub default_absolute: QuatT,
}

impl Joint {
    pub(crate) fn from_desc(desc: &JointDesc) -> Self {
        Self {
            name_crc: crc32_lowercase(&desc.name),
            name: desc.name.clone(),
            parent: desc.parent,
            default_relative: desc.relative.normalized(),
            default_absolute: QuatT::IDENTITY,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent < 0
    }
}
