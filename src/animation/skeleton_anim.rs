//! 骨骼动画调度
//!
//! 管理 16 个虚拟动画层。第 0 层为全身基础层，其余层为部分身体或加法叠加层。

use crate::command::{ApplyFallbackPose, ClearPoseBuffer, CommandBuffer, NormalizeFull, TargetBuffer};
use crate::config::AnimationConfig;
use crate::error::{AnimError, Result};

use super::animation_set::{AnimationSet, ClipId};
use super::layer_queue::LayerQueue;
use super::params::AnimParams;

/// 虚拟层数量
pub const NUM_LAYERS: usize = 16;

/// 骨骼动画调度
#[derive(Clone, Debug)]
pub struct SkeletonAnim {
    layers: Vec<LayerQueue>,
    /// 全局播放速度
    pub playback_scale: f32,
}

impl Default for SkeletonAnim {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonAnim {
    pub fn new() -> Self {
        Self {
            layers: vec![LayerQueue::new(); NUM_LAYERS],
            playback_scale: 1.0,
        }
    }

    fn layer_mut(&mut self, layer: usize) -> Result<&mut LayerQueue> {
        self.layers.get_mut(layer).ok_or(AnimError::InvalidLayer(layer))
    }

    /// 按名称开始播放
    pub fn start_animation(
        &mut self,
        set: &AnimationSet,
        layer: usize,
        name: &str,
        params: AnimParams,
    ) -> Result<bool> {
        let id = set
            .clip_id_by_name(name)
            .ok_or_else(|| AnimError::ClipNotFound(name.to_string()))?;
        self.start_animation_by_id(set, layer, id, params)
    }

    /// 按句柄开始播放，返回是否实际入队
    pub fn start_animation_by_id(
        &mut self,
        set: &AnimationSet,
        layer: usize,
        id: ClipId,
        params: AnimParams,
    ) -> Result<bool> {
        let clip = set
            .clip(id)
            .ok_or_else(|| AnimError::ClipNotFound(format!("#{}", id.0)))?;
        let queue = self.layer_mut(layer)?;
        Ok(queue.push(id, clip, params, layer == 0))
    }

    /// 停止某层，blend_out_time 内淡出
    pub fn stop_animation_in_layer(&mut self, layer: usize, blend_out_time: f32) -> Result<()> {
        self.layer_mut(layer)?.stop(blend_out_time);
        Ok(())
    }

    pub fn stop_animations_all_layers(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }

    pub fn set_layer_weight(&mut self, layer: usize, weight: f32) -> Result<()> {
        self.layer_mut(layer)?.set_layer_weight(weight);
        Ok(())
    }

    #[inline]
    pub fn layer(&self, layer: usize) -> Option<&LayerQueue> {
        self.layers.get(layer)
    }

    pub fn num_animations_in_fifo(&self, layer: usize) -> usize {
        self.layers.get(layer).map_or(0, LayerQueue::len)
    }

    /// 最新动画的归一化时间
    pub fn animation_time(&self, layer: usize) -> Option<f32> {
        self.layers.get(layer)?.entries().last().map(|e| e.time())
    }

    /// 推进所有层
    pub fn update(&mut self, dt: f32) {
        let dt = dt * self.playback_scale;
        for layer in &mut self.layers {
            layer.update(dt);
        }
    }

    /// 追加本帧的采样、归一化、回退与层混合命令
    pub fn create_commands(&self, set: &AnimationSet, buffer: &mut CommandBuffer, config: &AnimationConfig) {
        if !config.sampling_enabled {
            return;
        }

        let target = TargetBuffer::Target;
        buffer.create_command(ClearPoseBuffer { target });
        self.layers[0].create_commands(0, set, buffer, config.hemisphere_reference);
        buffer.create_command(NormalizeFull { target });
        buffer.create_command(ApplyFallbackPose { target });

        for (index, layer) in self.layers.iter().enumerate().skip(1) {
            layer.create_commands(index, set, buffer, config.hemisphere_reference);
        }
    }
}
