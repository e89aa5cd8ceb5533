//! 挂点状态快照
//!
//! 只保存每个挂点“主通道隐藏”一个布尔值，按名称 CRC 索引。
//! 模拟参数等其余状态由定义文件重新加载。

use serde::{Deserialize, Serialize};

use super::flags::AttachmentFlags;
use super::manager::AttachmentManager;

/// 单个挂点的保存状态
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentState {
    pub name_crc: u32,
    pub hidden_in_main_pass: bool,
}

/// 管理器快照
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    pub attachments: Vec<AttachmentState>,
}

impl AttachmentManager {
    /// 生成快照
    ///
    /// # Panics
    /// 仍有未执行的绑定修改时 panic：快照会与修改执行后的状态不一致。
    pub fn snapshot(&self) -> AttachmentSnapshot {
        if self.pending_modifications() > 0 {
            panic!(
                "[Attachment] 存在 {} 条未执行的绑定修改，不能序列化",
                self.pending_modifications()
            );
        }
        AttachmentSnapshot {
            attachments: self
                .attachments()
                .iter()
                .map(|a| AttachmentState {
                    name_crc: a.name_crc(),
                    hidden_in_main_pass: a.flags().contains(AttachmentFlags::HIDE_MAIN_PASS),
                })
                .collect(),
        }
    }

    /// 恢复快照，返回匹配到的挂点数；找不到的 CRC 被忽略
    pub fn restore(&mut self, snapshot: &AttachmentSnapshot) -> usize {
        if self.pending_modifications() > 0 {
            panic!(
                "[Attachment] 存在 {} 条未执行的绑定修改，不能反序列化",
                self.pending_modifications()
            );
        }
        let mut restored = 0;
        for state in &snapshot.attachments {
            let Some(index) = self.index_by_crc(state.name_crc) else {
                log::debug!("[Attachment] 快照中的挂点 0x{:08x} 不存在", state.name_crc);
                continue;
            };
            let flags = &mut self.attachments_mut()[index].base_mut().flags;
            flags.set(AttachmentFlags::HIDE_MAIN_PASS, state.hidden_in_main_pass);
            restored += 1;
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{AttachmentObject, AttachmentType};
    use crate::config::AnimationConfig;
    use crate::math::QuatT;
    use crate::skeleton::{DefaultSkeleton, JointDesc};
    use std::sync::Arc;

    fn manager() -> AttachmentManager {
        let skeleton = DefaultSkeleton::build(&[JointDesc::new("root", -1, QuatT::IDENTITY)]).unwrap();
        AttachmentManager::new(Arc::new(skeleton), &AnimationConfig::default())
    }

    #[test]
    fn test_json_round_trip() {
        let mut m = manager();
        m.create_attachment("hat", AttachmentType::Bone, "root").unwrap();
        m.create_attachment("cape", AttachmentType::Face, "").unwrap();
        m.get_mut(0).unwrap().hide_attachment(true);

        let json = serde_json::to_string(&m.snapshot()).unwrap();
        let snapshot: AttachmentSnapshot = serde_json::from_str(&json).unwrap();

        let mut other = manager();
        other.create_attachment("cape", AttachmentType::Face, "").unwrap();
        other.create_attachment("hat", AttachmentType::Bone, "root").unwrap();
        assert_eq!(other.restore(&snapshot), 2);
        assert!(other.get_by_name("hat").unwrap().is_attachment_hidden());
        assert!(!other.get_by_name("cape").unwrap().is_attachment_hidden());
    }

    #[test]
    #[should_panic(expected = "不能序列化")]
    fn test_snapshot_with_pending_modifications_panics() {
        let mut m = manager();
        m.create_attachment("hat", AttachmentType::Bone, "root").unwrap();
        m.add_binding("hat", AttachmentObject::Entity { id: 1 }).unwrap();
        let _ = m.snapshot();
    }
}
