//! 角色实例与层级调度
//!
//! `CharacterInstance` 把姿态、动画层、命令缓冲区和挂点管理器组合成一个角色，
//! `CharacterArena` 以句柄持有所有角色，`ContextQueue` 把父角色与挂在其上的子角色
//! 排成父先子后的扁平队列并逐层处理。

mod arena;
mod context_queue;
mod instance;
mod physics_sync;
mod pose_modifier;

pub use arena::{CharacterArena, CharacterId};
pub use context_queue::{ContextQueue, ContextState, ProcessingContext};
pub use instance::CharacterInstance;
pub use physics_sync::PhysicsSync;
pub use pose_modifier::PoseModifier;
