//! 动画播放参数

use bitflags::bitflags;

bitflags! {
    /// 播放标志
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AnimFlags: u32 {
        /// 循环播放
        const LOOP = 1 << 0;
        /// 播放结束后保持最后一帧
        const REPEAT_LAST_KEY = 1 << 1;
        /// 队列末尾已是同一动画时仍然重新开始
        const ALLOW_RESTART = 1 << 2;
    }
}

/// 播放参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimParams {
    /// 过渡时间（秒）
    pub transition_time: f32,
    /// 播放速度倍率
    pub playback_speed: f32,
    /// 播放权重
    pub playback_weight: f32,
    /// 起始归一化时间
    pub start_time: f32,
    /// 标志
    pub flags: AnimFlags,
}

impl Default for AnimParams {
    fn default() -> Self {
        Self {
            transition_time: 0.2,
            playback_speed: 1.0,
            playback_weight: 1.0,
            start_time: 0.0,
            flags: AnimFlags::empty(),
        }
    }
}

impl AnimParams {
    /// 循环动画参数
    pub fn looping() -> Self {
        Self {
            flags: AnimFlags::LOOP,
            ..Self::default()
        }
    }

    pub fn with_transition(mut self, seconds: f32) -> Self {
        self.transition_time = seconds;
        self
    }

    pub fn with_flags(mut self, flags: AnimFlags) -> Self {
        self.flags |= flags;
        self
    }
}
