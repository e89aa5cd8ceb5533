//! 动画集合
//!
//! 某个骨架可用的全部动画片段。加入时把轨道解析到骨骼索引。

use std::sync::Arc;

use crate::error::{AnimError, Result};
use crate::math::crc32_lowercase;
use crate::skeleton::DefaultSkeleton;

use super::clip::AnimationClip;

/// 动画片段句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u32);

/// 动画集合
#[derive(Clone, Debug)]
pub struct AnimationSet {
    skeleton: Arc<DefaultSkeleton>,
    clips: Vec<AnimationClip>,
}

impl AnimationSet {
    pub fn new(skeleton: Arc<DefaultSkeleton>) -> Self {
        Self {
            skeleton,
            clips: Vec::new(),
        }
    }

    /// 加入动画片段
    ///
    /// 找不到骨骼的轨道会被丢弃并记录警告。同名片段返回错误。
    pub fn add_clip(&mut self, mut clip: AnimationClip) -> Result<ClipId> {
        if self.clips.iter().any(|c| c.name_crc == clip.name_crc) {
            return Err(AnimError::DuplicateClip(clip.name));
        }

        let skeleton = &self.skeleton;
        clip.tracks.retain_mut(|track| {
            track.joint_id = skeleton.joint_id_by_crc(track.joint_crc);
            if track.joint_id < 0 {
                log::warn!(
                    "[AnimationSet] 动画 {} 的轨道 {} 找不到对应骨骼，已忽略",
                    clip.name,
                    track.joint_name
                );
                return false;
            }
            true
        });

        let id = ClipId(self.clips.len() as u32);
        log::debug!(
            "[AnimationSet] 加入动画 {} ({} 条轨道, {} 帧)",
            clip.name,
            clip.tracks.len(),
            clip.frame_count()
        );
        self.clips.push(clip);
        Ok(id)
    }

    #[inline]
    pub fn clip(&self, id: ClipId) -> Option<&AnimationClip> {
        self.clips.get(id.0 as usize)
    }

    /// 按名称查找（忽略大小写）
    pub fn clip_id_by_name(&self, name: &str) -> Option<ClipId> {
        let crc = crc32_lowercase(name);
        self.clips
            .iter()
            .position(|c| c.name_crc == crc)
            .map(|i| ClipId(i as u32))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<DefaultSkeleton> {
        &self.skeleton
    }
}
