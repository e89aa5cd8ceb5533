//! 错误类型
//!
//! 资源错误（找不到骨骼、属性格式错误）在管理器边界内记录日志并降级处理；
//! API 误用通过 `Result` 返回给调用方；命令流损坏等不变量破坏直接 panic。

use thiserror::Error;

/// 动画系统错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    /// 骨骼名称无法解析
    #[error("找不到骨骼: {0}")]
    JointNotFound(String),

    /// 挂点名称（小写）或其哈希已存在
    #[error("挂点已存在: {name} (crc 0x{crc:08x})")]
    DuplicateAttachment { name: String, crc: u32 },

    /// 挂点不存在
    #[error("找不到挂点: {0}")]
    AttachmentNotFound(String),

    /// 挂点类型不支持该操作
    #[error("挂点类型无效: {0}")]
    InvalidAttachmentType(String),

    /// 挂点定义属性格式错误
    #[error("属性 {name} 格式错误: {value}")]
    InvalidAttribute { name: String, value: String },

    /// 骨架结构不合法
    #[error("骨架错误: {0}")]
    Skeleton(String),

    /// 动画片段不存在
    #[error("找不到动画: {0}")]
    ClipNotFound(String),

    /// 同名动画片段已存在
    #[error("动画已存在: {0}")]
    DuplicateClip(String),

    /// 动画层索引越界
    #[error("动画层无效: {0}")]
    InvalidLayer(usize),

    /// 角色实例不存在
    #[error("找不到角色实例: {0}")]
    CharacterNotFound(u32),
}

/// 使用 AnimError 的 Result
pub type Result<T> = std::result::Result<T, AnimError>;
