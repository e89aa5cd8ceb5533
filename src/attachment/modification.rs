//! 延迟的绑定修改
//!
//! 动画计算进行中不能改动挂点结构。绑定/解绑/交换先记录下来，
//! 由 `AttachmentManager::update_bindings` 在安全时机统一执行。

use super::object::AttachmentObject;

/// 一条绑定修改
#[derive(Clone, Debug, PartialEq)]
pub enum ModificationCommand {
    AddBinding { target_crc: u32, object: AttachmentObject },
    ClearBinding { target_crc: u32 },
    SwapBinding { target_crc: u32, other_crc: u32 },
}

impl ModificationCommand {
    #[inline]
    pub fn target_crc(&self) -> u32 {
        match self {
            ModificationCommand::AddBinding { target_crc, .. }
            | ModificationCommand::ClearBinding { target_crc }
            | ModificationCommand::SwapBinding { target_crc, .. } => *target_crc,
        }
    }
}

/// 修改命令缓冲区
#[derive(Debug, Default)]
pub struct ModificationCommandBuffer {
    commands: Vec<ModificationCommand>,
}

impl ModificationCommandBuffer {
    pub fn push(&mut self, command: ModificationCommand) {
        self.commands.push(command);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 取出全部命令（按记录顺序）
    pub fn drain(&mut self) -> std::vec::Drain<'_, ModificationCommand> {
        self.commands.drain(..)
    }
}

impl Drop for ModificationCommandBuffer {
    fn drop(&mut self) {
        debug_assert!(
            self.commands.is_empty() || std::thread::panicking(),
            "ModificationCommandBuffer 销毁时仍有 {} 条命令未执行",
            self.commands.len()
        );
    }
}
