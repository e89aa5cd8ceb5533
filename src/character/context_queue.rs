//! 角色层级调度队列
//!
//! 把根角色及其递归挂载的子角色排成一个扁平数组。队列按广度优先构建，
//! 因此同一深度的角色连续存放，每个角色的直接子角色也是一段连续区间。
//! 处理按深度分波进行：同一波内的角色互不依赖，可以并行；
//! 父角色本帧输出的挂点变换在下一波开始前写入子角色的世界位置。
//! 全部动画完成后逆序收尾，子角色总是先于父角色完成。

use std::collections::HashSet;
use std::ops::Range;

use rayon::prelude::*;

use crate::config::{AnimationConfig, FrameContext};
use crate::math::Aabb;

use super::arena::{CharacterArena, CharacterId};
use super::instance::CharacterInstance;

/// 上下文状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// 本帧尚未处理
    Pending,
    /// 动画与挂点已更新，等待子角色
    Animated,
    /// 本帧完成
    Finished,
    /// 角色不在池中，跳过
    Skipped,
}

/// 一个角色在队列中的位置
#[derive(Clone, Debug)]
pub struct ProcessingContext {
    pub character: CharacterId,
    /// 父上下文索引
    pub parent: Option<usize>,
    pub depth: u32,
    /// 直接子角色的上下文区间
    pub children: Range<usize>,
    pub state: ContextState,
    /// 父挂点的距离剔除结果，根角色恒为 true
    pub visible: bool,
    /// 自身与全部子角色的世界包围盒
    pub combined_bounds: Aabb,
}

impl ProcessingContext {
    fn new(character: CharacterId, parent: Option<usize>, depth: u32) -> Self {
        Self {
            character,
            parent,
            depth,
            children: 0..0,
            state: ContextState::Pending,
            visible: true,
            combined_bounds: Aabb::EMPTY,
        }
    }
}

/// 角色层级调度队列
#[derive(Debug, Default)]
pub struct ContextQueue {
    contexts: Vec<ProcessingContext>,
    /// 每个深度的上下文区间
    waves: Vec<Range<usize>>,
    parallel: bool,
}

impl ContextQueue {
    pub fn new(config: &AnimationConfig) -> Self {
        Self {
            contexts: Vec::new(),
            waves: Vec::new(),
            parallel: config.parallel_processing,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    #[inline]
    pub fn contexts(&self) -> &[ProcessingContext] {
        &self.contexts
    }

    #[inline]
    pub fn context(&self, index: usize) -> Option<&ProcessingContext> {
        self.contexts.get(index)
    }

    /// 直接子角色的上下文
    pub fn children(&self, index: usize) -> &[ProcessingContext] {
        match self.contexts.get(index) {
            Some(ctx) => &self.contexts[ctx.children.clone()],
            None => &[],
        }
    }

    pub fn index_of(&self, character: CharacterId) -> Option<usize> {
        self.contexts.iter().position(|c| c.character == character)
    }

    /// 层数
    #[inline]
    pub fn depth_count(&self) -> usize {
        self.waves.len()
    }

    // ========================================
    // 构建
    // ========================================

    /// 从根角色构建队列
    ///
    /// 构建前会执行每个角色的延迟绑定修改，保证子角色列表是最新的。
    /// 同一角色只会出现一次；重复出现或不在池中的子角色被忽略。
    pub fn build(&mut self, arena: &mut CharacterArena, roots: &[CharacterId]) {
        self.contexts.clear();
        self.waves.clear();
        let mut visited = HashSet::new();

        for &root in roots {
            let Some(instance) = arena.get_mut(root) else {
                log::warn!("[ContextQueue] 根角色 #{:08x} 不存在", root.0);
                continue;
            };
            if !visited.insert(root) {
                log::warn!("[ContextQueue] 角色 {} 重复出现在根列表中", instance.name());
                continue;
            }
            instance.flush_changes();
            self.contexts.push(ProcessingContext::new(root, None, 0));
        }

        let mut cursor = 0;
        while cursor < self.contexts.len() {
            let parent_id = self.contexts[cursor].character;
            let depth = self.contexts[cursor].depth + 1;
            let children: Vec<CharacterId> = arena
                .get(parent_id)
                .map(|p| p.attachments().attached_characters().to_vec())
                .unwrap_or_default();

            let first = self.contexts.len();
            for child in children {
                let Some(instance) = arena.get_mut(child) else {
                    log::warn!("[ContextQueue] 子角色 #{:08x} 已不存在", child.0);
                    continue;
                };
                if !visited.insert(child) {
                    log::warn!("[ContextQueue] 角色 {} 被多处挂载或形成环，只处理第一次", instance.name());
                    continue;
                }
                instance.flush_changes();
                self.contexts.push(ProcessingContext::new(child, Some(cursor), depth));
            }
            self.contexts[cursor].children = first..self.contexts.len();
            cursor += 1;
        }

        let mut begin = 0;
        for (i, ctx) in self.contexts.iter().enumerate() {
            if ctx.depth as usize != self.waves.len() {
                self.waves.push(begin..i);
                begin = i;
            }
        }
        if begin < self.contexts.len() {
            self.waves.push(begin..self.contexts.len());
        }

        log::debug!(
            "[ContextQueue] {} 个角色, {} 层",
            self.contexts.len(),
            self.waves.len()
        );
    }

    // ========================================
    // 执行
    // ========================================

    /// 按层处理全部角色，然后逆序收尾
    pub fn execute(&mut self, arena: &mut CharacterArena, frame: &FrameContext) {
        for wave in self.waves.clone() {
            self.run_wave(arena, wave, frame);
        }
        for index in (0..self.contexts.len()).rev() {
            self.finish(arena, index);
        }
    }

    /// 构建并执行
    pub fn process(&mut self, arena: &mut CharacterArena, roots: &[CharacterId], frame: &FrameContext) {
        self.build(arena, roots);
        self.execute(arena, frame);
    }

    fn run_wave(&mut self, arena: &mut CharacterArena, wave: Range<usize>, frame: &FrameContext) {
        let mut jobs: Vec<(usize, CharacterInstance)> = Vec::with_capacity(wave.len());
        for index in wave {
            let ctx = &mut self.contexts[index];
            match arena.take(ctx.character) {
                Some(instance) => jobs.push((index, instance)),
                None => {
                    log::warn!("[ContextQueue] 角色 #{:08x} 在处理前被删除", ctx.character.0);
                    ctx.state = ContextState::Skipped;
                }
            }
        }

        if self.parallel && jobs.len() > 1 {
            jobs.par_iter_mut().for_each(|(_, instance)| instance.update(frame));
        } else {
            for (_, instance) in &mut jobs {
                instance.update(frame);
            }
        }

        for (index, instance) in jobs {
            self.contexts[index].state = ContextState::Animated;
            self.forward_to_children(arena, index, &instance);
            arena.put_back(self.contexts[index].character, instance);
        }
    }

    /// 把父角色本帧的挂点变换写入子角色
    fn forward_to_children(&mut self, arena: &mut CharacterArena, index: usize, parent: &CharacterInstance) {
        let children = self.contexts[index].children.clone();
        if children.is_empty() {
            return;
        }
        for update in parent.attached_updates() {
            let Some(child) = update.character else {
                continue;
            };
            let Some(slot) = children.clone().find(|&c| self.contexts[c].character == child) else {
                continue;
            };
            self.contexts[slot].visible = update.visible;
            if let Some(instance) = arena.get_mut(child) {
                instance.set_location(update.world);
                instance.set_parent_hidden(update.hidden);
            }
        }
    }

    /// 子角色是否都已完成
    ///
    /// 只扫描直接子角色区间；孙角色在子角色收尾时已检查过。
    pub fn wait_for_children(&self, index: usize) -> bool {
        self.children(index)
            .iter()
            .all(|c| matches!(c.state, ContextState::Finished | ContextState::Skipped))
    }

    fn finish(&mut self, arena: &CharacterArena, index: usize) {
        if self.contexts[index].state != ContextState::Animated {
            return;
        }
        if !self.wait_for_children(index) {
            log::error!("[ContextQueue] 上下文 {} 收尾时仍有未完成的子角色", index);
            return;
        }

        let ctx = &self.contexts[index];
        let mut bounds = arena
            .get(ctx.character)
            .map(CharacterInstance::world_bounding_box)
            .unwrap_or(Aabb::EMPTY);
        for child in &self.contexts[ctx.children.clone()] {
            bounds.merge(&child.combined_bounds);
        }

        let ctx = &mut self.contexts[index];
        ctx.combined_bounds = bounds;
        ctx.state = ContextState::Finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationSet;
    use crate::attachment::{AttachmentObject, AttachmentType};
    use crate::math::QuatT;
    use crate::skeleton::{DefaultSkeleton, JointDesc};
    use glam::Vec3;
    use std::sync::Arc;

    fn character(name: &str) -> CharacterInstance {
        let skeleton = Arc::new(
            DefaultSkeleton::build(&[
                JointDesc::new("root", -1, QuatT::IDENTITY),
                JointDesc::new("hand", 0, QuatT::from_translation(Vec3::new(1.0, 0.0, 1.0))),
            ])
            .unwrap(),
        );
        let set = Arc::new(AnimationSet::new(Arc::clone(&skeleton)));
        CharacterInstance::new(name, skeleton, set, AnimationConfig::default()).unwrap()
    }

    /// 在 parent 的 hand 上挂一个子角色
    fn attach(arena: &mut CharacterArena, parent: CharacterId, child: CharacterId, socket: &str) {
        let manager = arena.get_mut(parent).unwrap().attachments_mut();
        let index = manager.create_attachment(socket, AttachmentType::Bone, "hand").unwrap();
        let skeleton = Arc::clone(manager.skeleton());
        // 挂点原点与 hand 重合
        assert!(manager
            .get_mut(index)
            .and_then(|a| a.as_bone_mut())
            .unwrap()
            .set_relative_default(QuatT::IDENTITY, &skeleton));
        manager.add_binding(socket, AttachmentObject::Skeleton(child)).unwrap();
    }

    #[test]
    fn test_parent_before_child_with_ranges() {
        let mut arena = CharacterArena::new();
        let hero = arena.insert(character("hero"));
        let sword = arena.insert(character("sword"));
        let shield = arena.insert(character("shield"));
        let gem = arena.insert(character("gem"));
        attach(&mut arena, hero, sword, "right");
        attach(&mut arena, hero, shield, "left");
        attach(&mut arena, sword, gem, "socket");

        let mut queue = ContextQueue::new(&AnimationConfig::default());
        queue.build(&mut arena, &[hero]);

        let order: Vec<CharacterId> = queue.contexts().iter().map(|c| c.character).collect();
        assert_eq!(order, vec![hero, sword, shield, gem]);
        assert_eq!(queue.context(0).unwrap().children, 1..3);
        assert_eq!(queue.context(1).unwrap().children, 3..4);
        assert_eq!(queue.context(3).unwrap().parent, Some(1));
        assert_eq!(queue.depth_count(), 3);
    }

    #[test]
    fn test_child_follows_parent_socket() {
        let mut arena = CharacterArena::new();
        let hero = arena.insert(character("hero"));
        let sword = arena.insert(character("sword"));
        attach(&mut arena, hero, sword, "right");
        arena
            .get_mut(hero)
            .unwrap()
            .set_location(crate::math::QuatTS::new(glam::Quat::IDENTITY, Vec3::new(10.0, 0.0, 0.0), 1.0));

        let mut queue = ContextQueue::new(&AnimationConfig::default());
        queue.process(&mut arena, &[hero], &FrameContext::default());

        let location = arena.get(sword).unwrap().location();
        assert!(location.t.abs_diff_eq(Vec3::new(11.0, 0.0, 1.0), 1.0e-4));
        assert!(queue.contexts().iter().all(|c| c.state == ContextState::Finished));
        assert!(queue.wait_for_children(0));

        // 父包围盒包含子角色
        let combined = queue.context(0).unwrap().combined_bounds;
        assert!(combined.contains(Vec3::new(12.0, 0.0, 2.0)));
    }

    #[test]
    fn test_cycle_is_broken() {
        let mut arena = CharacterArena::new();
        let a = arena.insert(character("a"));
        let b = arena.insert(character("b"));
        attach(&mut arena, a, b, "x");
        attach(&mut arena, b, a, "y");

        let mut queue = ContextQueue::new(&AnimationConfig::default());
        queue.process(&mut arena, &[a], &FrameContext::default());
        assert_eq!(queue.len(), 2);
        assert_eq!(arena.get(a).unwrap().frame_count(), 1);
        assert_eq!(arena.get(b).unwrap().frame_count(), 1);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let run = |parallel: bool| {
            let mut arena = CharacterArena::new();
            let roots: Vec<CharacterId> = (0..6).map(|i| arena.insert(character(&format!("npc{i}")))).collect();
            for (i, &id) in roots.iter().enumerate() {
                arena.get_mut(id).unwrap().set_location(crate::math::QuatTS::new(
                    glam::Quat::IDENTITY,
                    Vec3::new(i as f32, 0.0, 0.0),
                    1.0,
                ));
            }
            let config = AnimationConfig {
                parallel_processing: parallel,
                ..AnimationConfig::default()
            };
            let mut queue = ContextQueue::new(&config);
            queue.process(&mut arena, &roots, &FrameContext::default());
            queue.contexts().iter().map(|c| c.combined_bounds).collect::<Vec<_>>()
        };
        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_removed_root_is_skipped() {
        let mut arena = CharacterArena::new();
        let a = arena.insert(character("a"));
        let gone = arena.insert(character("gone"));
        arena.remove(gone).unwrap();

        let mut queue = ContextQueue::new(&AnimationConfig::default());
        queue.process(&mut arena, &[a, gone], &FrameContext::default());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.index_of(a), Some(0));
        assert_eq!(queue.index_of(gone), None);
    }
}
