//! 角色池
//!
//! 父子角色之间只保存句柄，不持有对方。删除后的槽位会被复用，
//! 句柄里的代数用于识别已失效的旧句柄。

use crate::error::{AnimError, Result};

use super::instance::CharacterInstance;

/// 角色句柄：低 20 位为槽位索引，高 12 位为代数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(pub u32);

const INDEX_BITS: u32 = 20;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << (32 - INDEX_BITS)) - 1;

impl CharacterId {
    fn new(index: usize, generation: u32) -> Self {
        Self(((generation & GENERATION_MASK) << INDEX_BITS) | (index as u32 & INDEX_MASK))
    }

    #[inline]
    pub fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.0 >> INDEX_BITS
    }
}

#[derive(Default)]
struct Slot {
    generation: u32,
    instance: Option<CharacterInstance>,
}

/// 角色池
#[derive(Default)]
pub struct CharacterArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    len: usize,
}

impl CharacterArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: CharacterInstance) -> CharacterId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() > INDEX_MASK as usize {
                    panic!("[Character] 角色池已满 ({} 个槽位)", self.slots.len());
                }
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.instance = Some(instance);
        self.len += 1;
        let id = CharacterId::new(index, slot.generation);
        log::debug!("[Character] 创建角色 #{:08x}", id.0);
        id
    }

    fn slot(&self, id: CharacterId) -> Option<&Slot> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation & GENERATION_MASK == id.generation())
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: CharacterId) -> Option<&CharacterInstance> {
        self.slot(id)?.instance.as_ref()
    }

    pub fn get_mut(&mut self, id: CharacterId) -> Option<&mut CharacterInstance> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation & GENERATION_MASK != id.generation() {
            return None;
        }
        slot.instance.as_mut()
    }

    /// 删除角色，返回其实例
    pub fn remove(&mut self, id: CharacterId) -> Result<CharacterInstance> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation & GENERATION_MASK == id.generation())
            .ok_or(AnimError::CharacterNotFound(id.0))?;
        let instance = slot.instance.take().ok_or(AnimError::CharacterNotFound(id.0))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        log::debug!("[Character] 删除角色 #{:08x}", id.0);
        Ok(instance)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 所有有效句柄，按槽位顺序
    pub fn ids(&self) -> Vec<CharacterId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.instance.is_some())
            .map(|(index, slot)| CharacterId::new(index, slot.generation))
            .collect()
    }

    /// 临时取出实例，处理完后用 `put_back` 放回；槽位保持占用
    pub(crate) fn take(&mut self, id: CharacterId) -> Option<CharacterInstance> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation & GENERATION_MASK != id.generation() {
            return None;
        }
        slot.instance.take()
    }

    pub(crate) fn put_back(&mut self, id: CharacterId, instance: CharacterInstance) {
        match self.slots.get_mut(id.index()) {
            Some(slot) if slot.generation & GENERATION_MASK == id.generation() && slot.instance.is_none() => {
                slot.instance = Some(instance);
            }
            _ => panic!("[Character] 放回角色 #{:08x} 时槽位状态不一致", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationSet;
    use crate::config::AnimationConfig;
    use crate::math::QuatT;
    use crate::skeleton::{DefaultSkeleton, JointDesc};
    use std::sync::Arc;

    fn instance(name: &str) -> CharacterInstance {
        let skeleton = Arc::new(DefaultSkeleton::build(&[JointDesc::new("root", -1, QuatT::IDENTITY)]).unwrap());
        let set = Arc::new(AnimationSet::new(Arc::clone(&skeleton)));
        CharacterInstance::new(name, skeleton, set, AnimationConfig::default()).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let mut arena = CharacterArena::new();
        let a = arena.insert(instance("a"));
        let b = arena.insert(instance("b"));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).unwrap().name(), "b");

        let removed = arena.remove(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(arena.get(a).is_none());
        assert!(matches!(arena.remove(a), Err(AnimError::CharacterNotFound(id)) if id == a.0));
    }

    #[test]
    fn test_stale_id_after_reuse() {
        let mut arena = CharacterArena::new();
        let a = arena.insert(instance("a"));
        arena.remove(a).unwrap();
        let c = arena.insert(instance("c"));
        // 槽位复用，代数不同
        assert_eq!(a.index(), c.index());
        assert_ne!(a, c);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c).unwrap().name(), "c");
        assert_eq!(arena.ids(), vec![c]);
    }
}
