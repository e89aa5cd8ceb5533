//! 动画片段
//!
//! 每个骨骼一条轨道，旋转、平移、缩放关键帧分别存放在按帧索引排序的映射中。

use glam::{Quat, Vec3};
use std::collections::BTreeMap;

use crate::math::{crc32_lowercase, hemisphere_align};

/// 单骨骼单帧采样结果
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackSample {
    pub rotation: Option<Quat>,
    pub position: Option<Vec3>,
    pub scale: Option<Vec3>,
}

// ============================================================================
// 骨骼轨道
// ============================================================================

/// 骨骼轨道
#[derive(Clone, Debug)]
pub struct JointTrack {
    /// 目标骨骼名称
    pub joint_name: String,
    /// 目标骨骼名称 CRC（小写）
    pub joint_crc: u32,
    /// 解析后的骨骼索引，加入 AnimationSet 时填写
    pub(crate) joint_id: i32,
    /// 旋转关键帧（帧索引 -> 四元数）
    pub rotation: BTreeMap<u32, Quat>,
    /// 平移关键帧
    pub position: BTreeMap<u32, Vec3>,
    /// 缩放关键帧
    pub scale: BTreeMap<u32, Vec3>,
}

impl JointTrack {
    pub fn new(joint_name: impl Into<String>) -> Self {
        let joint_name = joint_name.into();
        Self {
            joint_crc: crc32_lowercase(&joint_name),
            joint_name,
            joint_id: -1,
            rotation: BTreeMap::new(),
            position: BTreeMap::new(),
            scale: BTreeMap::new(),
        }
    }

    pub fn insert_rotation(&mut self, frame: u32, q: Quat) -> Option<Quat> {
        self.rotation.insert(frame, q.normalize())
    }

    pub fn insert_position(&mut self, frame: u32, t: Vec3) -> Option<Vec3> {
        self.position.insert(frame, t)
    }

    pub fn insert_scale(&mut self, frame: u32, s: Vec3) -> Option<Vec3> {
        self.scale.insert(frame, s)
    }

    #[inline]
    pub fn joint_id(&self) -> i32 {
        self.joint_id
    }

    /// 最大帧索引
    pub fn max_frame_index(&self) -> u32 {
        [
            self.rotation.keys().next_back(),
            self.position.keys().next_back(),
            self.scale.keys().next_back(),
        ]
        .into_iter()
        .flatten()
        .copied()
        .max()
        .unwrap_or(0)
    }

    /// 在（可带小数的）帧位置求值
    pub fn sample(&self, frame: f32) -> TrackSample {
        TrackSample {
            rotation: seek_precisely(&self.rotation, frame, |a, b, t| {
                a.slerp(hemisphere_align(b, a), t)
            }),
            position: seek_precisely(&self.position, frame, |a, b, t| a.lerp(b, t)),
            scale: seek_precisely(&self.scale, frame, |a, b, t| a.lerp(b, t)),
        }
    }
}

/// 查找最近的前后关键帧并插值；越界时取端点
fn seek_precisely<T: Copy>(
    keys: &BTreeMap<u32, T>,
    frame: f32,
    interpolate: impl Fn(T, T, f32) -> T,
) -> Option<T> {
    let frame = frame.max(0.0);
    let index = frame.floor() as u32;

    let prev = keys.range(..=index).next_back();
    let next = keys.range(index.saturating_add(1)..).next();

    match (prev, next) {
        (Some((&p, &a)), Some((&n, &b))) => {
            let coef = (frame - p as f32) / (n - p) as f32;
            Some(interpolate(a, b, coef.clamp(0.0, 1.0)))
        }
        (Some((_, &a)), None) => Some(a),
        (None, Some((_, &b))) => Some(b),
        (None, None) => None,
    }
}

// ============================================================================
// 动画片段
// ============================================================================

/// 动画片段
#[derive(Clone, Debug)]
pub struct AnimationClip {
    /// 名称
    pub name: String,
    /// 小写名称 CRC
    pub name_crc: u32,
    /// 帧率
    pub frame_rate: f32,
    /// 加法动画：关键帧是相对绑定姿态的增量
    pub additive: bool,
    /// 骨骼轨道
    pub tracks: Vec<JointTrack>,
    frame_count: u32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, frame_rate: f32) -> Self {
        let name = name.into();
        Self {
            name_crc: crc32_lowercase(&name),
            name,
            frame_rate: frame_rate.max(1.0),
            additive: false,
            tracks: Vec::new(),
            frame_count: 0,
        }
    }

    pub fn with_additive(mut self, additive: bool) -> Self {
        self.additive = additive;
        self
    }

    /// 添加轨道并更新时长
    pub fn add_track(&mut self, track: JointTrack) {
        self.frame_count = self.frame_count.max(track.max_frame_index());
        self.tracks.push(track);
    }

    /// 时长（帧）
    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// 时长（秒），单帧动画视为一帧长
    #[inline]
    pub fn duration(&self) -> f32 {
        self.frame_count.max(1) as f32 / self.frame_rate
    }

    /// 归一化时间转换为帧位置
    #[inline]
    pub fn frame_at(&self, normalized_time: f32) -> f32 {
        normalized_time.clamp(0.0, 1.0) * self.frame_count as f32
    }

    pub fn has_scale(&self) -> bool {
        self.tracks.iter().any(|t| !t.scale.is_empty())
    }
}
