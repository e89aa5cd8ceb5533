//! 动画层队列
//!
//! 每层一个先进先出队列，记录正在混合的动画、时间与过渡权重，
//! 并据此向命令缓冲区追加采样与混合命令。

use crate::command::{
    BlendMode, ClearPoseBuffer, CommandBuffer, HemisphereReference, NormalizeFull,
    PerJointBlending, SampleAddAnimFull, SampleAddAnimPart, TargetBuffer,
};

use super::animation_set::{AnimationSet, ClipId};
use super::clip::AnimationClip;
use super::params::{AnimFlags, AnimParams};

/// 权重低于此值的动画不采样
const MIN_SAMPLE_WEIGHT: f32 = 1.0e-4;

// ============================================================================
// 队列中的动画
// ============================================================================

/// 队列中的动画
#[derive(Clone, Debug)]
pub struct QueuedAnimation {
    pub clip: ClipId,
    pub params: AnimParams,
    /// 片段是否为加法动画
    pub additive: bool,
    /// 归一化时间 [0, 1]
    time: f32,
    /// 片段时长（秒）
    duration: f32,
    /// 过渡进度 [0, 1]
    blend_in: f32,
    /// 本帧过渡权重（层内归一化）
    weight: f32,
    end_reached: bool,
}

impl QueuedAnimation {
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    pub fn blend_in(&self) -> f32 {
        self.blend_in
    }

    #[inline]
    pub fn is_end_reached(&self) -> bool {
        self.end_reached
    }

    fn advance(&mut self, dt: f32) {
        let step = dt * self.params.playback_speed / self.duration.max(1.0e-4);
        self.time += step;
        if self.time >= 1.0 {
            if self.params.flags.contains(AnimFlags::LOOP) {
                self.time = self.time.fract();
            } else {
                self.time = 1.0;
                self.end_reached = true;
            }
        }

        if self.blend_in < 1.0 {
            self.blend_in = if self.params.transition_time > 0.0 {
                (self.blend_in + dt / self.params.transition_time).min(1.0)
            } else {
                1.0
            };
        }
    }

    /// 播放到末尾后不再需要
    fn is_expired(&self) -> bool {
        self.end_reached
            && !self
                .params
                .flags
                .intersects(AnimFlags::LOOP | AnimFlags::REPEAT_LAST_KEY)
    }
}

// ============================================================================
// 层队列
// ============================================================================

/// 单层动画队列
#[derive(Clone, Debug)]
pub struct LayerQueue {
    entries: Vec<QueuedAnimation>,
    /// 用户设置的层权重
    layer_weight: f32,
    /// 层淡入淡出系数
    fade: f32,
    /// 每秒淡入（正）或淡出（负）速度
    fade_speed: f32,
}

impl Default for LayerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            layer_weight: 1.0,
            fade: 1.0,
            fade_speed: 0.0,
        }
    }

    #[inline]
    pub fn entries(&self) -> &[QueuedAnimation] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn layer_weight(&self) -> f32 {
        self.layer_weight
    }

    pub fn set_layer_weight(&mut self, weight: f32) {
        self.layer_weight = weight.clamp(0.0, 1.0);
    }

    /// 层最终权重 = 层权重 * 淡入淡出系数
    #[inline]
    pub fn effective_weight(&self) -> f32 {
        self.layer_weight * self.fade
    }

    /// 入队。队尾已是同一动画且未设置 ALLOW_RESTART 时忽略并返回 false
    pub fn push(&mut self, id: ClipId, clip: &AnimationClip, params: AnimParams, base_layer: bool) -> bool {
        if let Some(last) = self.entries.last() {
            if last.clip == id && !last.end_reached && !params.flags.contains(AnimFlags::ALLOW_RESTART) {
                log::debug!("[LayerQueue] 动画 {} 已在队尾，忽略", clip.name);
                return false;
            }
        }

        let instant = self.entries.is_empty() || params.transition_time <= 0.0;

        if !base_layer {
            if self.entries.is_empty() {
                self.fade = 0.0;
            }
            if params.transition_time > 0.0 {
                self.fade_speed = 1.0 / params.transition_time;
            } else {
                self.fade = 1.0;
                self.fade_speed = 0.0;
            }
        }

        self.entries.push(QueuedAnimation {
            clip: id,
            params,
            additive: clip.additive,
            time: params.start_time.clamp(0.0, 1.0),
            duration: clip.duration(),
            blend_in: if instant { 1.0 } else { 0.0 },
            weight: 0.0,
            end_reached: false,
        });
        self.update_weights();
        true
    }

    /// 停止本层，blend_out_time 内淡出
    pub fn stop(&mut self, blend_out_time: f32) {
        if blend_out_time > 0.0 && !self.entries.is_empty() {
            self.fade_speed = -1.0 / blend_out_time;
        } else {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fade = 1.0;
        self.fade_speed = 0.0;
    }

    /// 推进时间与过渡
    pub fn update(&mut self, dt: f32) {
        for entry in &mut self.entries {
            entry.advance(dt);
        }

        // 最新的完全过渡完成的动画之前的条目不再需要
        if let Some(k) = self.entries.iter().rposition(|e| e.blend_in >= 1.0) {
            self.entries.drain(..k);
        }
        self.entries.retain(|e| !e.is_expired());

        if self.fade_speed != 0.0 {
            self.fade += self.fade_speed * dt;
            if self.fade >= 1.0 {
                self.fade = 1.0;
                self.fade_speed = 0.0;
            } else if self.fade <= 0.0 {
                self.clear();
            }
        }

        self.update_weights();
    }

    /// 较新的动画按过渡进度覆盖较旧的动画，然后层内归一化
    fn update_weights(&mut self) {
        let mut remaining = 1.0;
        for entry in self.entries.iter_mut().rev() {
            entry.weight = entry.blend_in * remaining * entry.params.playback_weight.max(0.0);
            remaining *= 1.0 - entry.blend_in;
        }

        let sum: f32 = self.entries.iter().map(|e| e.weight).sum();
        if sum > 0.0 {
            for entry in &mut self.entries {
                entry.weight /= sum;
            }
        }
    }

    /// 需要采样的动画
    fn sampled<'a>(&'a self, set: &'a AnimationSet) -> impl Iterator<Item = &'a QueuedAnimation> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.weight > MIN_SAMPLE_WEIGHT && set.clip(e.clip).is_some())
    }

    /// 追加本层的采样与混合命令
    ///
    /// 基础层直接累加到 Target；其余层采样到 Tmp 后按层权重混合。
    pub fn create_commands(
        &self,
        layer: usize,
        set: &AnimationSet,
        buffer: &mut CommandBuffer,
        hemisphere: HemisphereReference,
    ) {
        if layer == 0 {
            for entry in self.sampled(set) {
                buffer.create_command(SampleAddAnimFull {
                    clip: entry.clip,
                    time: entry.time,
                    weight: entry.weight,
                    target: TargetBuffer::Target,
                    hemisphere,
                });
            }
            return;
        }

        let layer_weight = self.effective_weight();
        if layer_weight <= MIN_SAMPLE_WEIGHT || self.sampled(set).next().is_none() {
            return;
        }

        buffer.create_command(ClearPoseBuffer {
            target: TargetBuffer::Tmp,
        });
        for entry in self.sampled(set) {
            buffer.create_command(SampleAddAnimPart {
                clip: entry.clip,
                time: entry.time,
                weight: entry.weight,
                target: TargetBuffer::Tmp,
                hemisphere,
            });
        }
        buffer.create_command(NormalizeFull {
            target: TargetBuffer::Tmp,
        });

        let additive = self.entries.last().is_some_and(|e| e.additive);
        buffer.create_command(PerJointBlending {
            mode: if additive {
                BlendMode::Additive
            } else {
                BlendMode::Override
            },
            layer_weight,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::JointTrack;
    use glam::Vec3;

    fn clip(name: &str, frames: u32) -> AnimationClip {
        let mut clip = AnimationClip::new(name, 30.0);
        let mut track = JointTrack::new("root");
        track.insert_position(frames, Vec3::X);
        clip.add_track(track);
        clip
    }

    #[test]
    fn test_first_entry_full_weight() {
        let c = clip("idle", 30);
        let mut q = LayerQueue::new();
        assert!(q.push(ClipId(0), &c, AnimParams::looping(), true));
        assert_eq!(q.entries()[0].weight(), 1.0);
    }

    #[test]
    fn test_transition_removes_old() {
        let a = clip("idle", 30);
        let b = clip("walk", 30);
        let mut q = LayerQueue::new();
        q.push(ClipId(0), &a, AnimParams::looping(), true);
        q.push(ClipId(1), &b, AnimParams::looping().with_transition(0.2), true);
        assert_eq!(q.len(), 2);

        q.update(0.1);
        let weights: Vec<f32> = q.entries().iter().map(|e| e.weight()).collect();
        assert!((weights[0] - 0.5).abs() < 1.0e-4);
        assert!((weights[1] - 0.5).abs() < 1.0e-4);

        q.update(0.15);
        assert_eq!(q.len(), 1);
        assert_eq!(q.entries()[0].clip, ClipId(1));
        assert_eq!(q.entries()[0].weight(), 1.0);
    }

    #[test]
    fn test_no_restart_of_same_clip() {
        let a = clip("idle", 30);
        let mut q = LayerQueue::new();
        q.push(ClipId(0), &a, AnimParams::looping(), true);
        assert!(!q.push(ClipId(0), &a, AnimParams::looping(), true));
        let restart = AnimParams::looping().with_flags(AnimFlags::ALLOW_RESTART);
        assert!(q.push(ClipId(0), &a, restart, true));
    }

    #[test]
    fn test_non_looping_expires() {
        let a = clip("jump", 30);
        let mut q = LayerQueue::new();
        q.push(ClipId(0), &a, AnimParams::default(), true);
        q.update(1.5);
        assert!(q.is_empty());

        let hold = AnimParams::default().with_flags(AnimFlags::REPEAT_LAST_KEY);
        q.push(ClipId(0), &a, hold, true);
        q.update(1.5);
        assert_eq!(q.len(), 1);
        assert_eq!(q.entries()[0].time(), 1.0);
    }

    #[test]
    fn test_overlay_fade() {
        let a = clip("wave", 30);
        let mut q = LayerQueue::new();
        q.push(ClipId(0), &a, AnimParams::looping().with_transition(0.5), false);
        assert_eq!(q.effective_weight(), 0.0);
        q.update(0.25);
        assert!((q.effective_weight() - 0.5).abs() < 1.0e-4);
        q.stop(0.1);
        q.update(0.2);
        assert!(q.is_empty());
    }
}
