//! 子角色变更日志
//!
//! 绑定/解绑子角色可能发生在其他角色的更新线程里，变更先写入这里，
//! 每帧由所属管理器在 `process_changes` 中统一取出。
//! 环形队列容量固定，满了之后写入溢出列表，取出时先环形队列后溢出列表，保持写入顺序。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::character::CharacterId;

/// 一条子角色变更
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachedChange {
    Insert(CharacterId),
    Erase(CharacterId),
}

#[derive(Debug, Default)]
struct Queues {
    ring: VecDeque<AttachedChange>,
    overflow: Vec<AttachedChange>,
}

/// 子角色变更日志
#[derive(Debug)]
pub struct AttachedCharacterCache {
    capacity: usize,
    queues: Mutex<Queues>,
    /// 写入溢出列表的次数
    overflow_count: AtomicU64,
}

impl AttachedCharacterCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queues: Mutex::new(Queues {
                ring: VecDeque::with_capacity(capacity),
                overflow: Vec::new(),
            }),
            overflow_count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, change: AttachedChange) {
        let mut queues = self.queues.lock();
        // 溢出列表非空时继续写溢出列表，否则顺序会乱
        if queues.ring.len() < self.capacity && queues.overflow.is_empty() {
            queues.ring.push_back(change);
        } else {
            queues.overflow.push(change);
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 按写入顺序取出全部变更
    pub fn drain(&self) -> Vec<AttachedChange> {
        let mut queues = self.queues.lock();
        let mut out: Vec<AttachedChange> = queues.ring.drain(..).collect();
        out.append(&mut queues.overflow);
        out
    }

    pub fn len(&self) -> usize {
        let queues = self.queues.lock();
        queues.ring.len() + queues.overflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_overflow_keeps_order() {
        let cache = AttachedCharacterCache::new(2);
        for i in 0..5 {
            cache.push(AttachedChange::Insert(CharacterId(i)));
        }
        assert_eq!(cache.overflow_count(), 3);
        let drained = cache.drain();
        let ids: Vec<u32> = drained
            .iter()
            .map(|c| match c {
                AttachedChange::Insert(id) | AttachedChange::Erase(id) => id.0,
            })
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_push() {
        let cache = Arc::new(AttachedCharacterCache::new(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        cache.push(AttachedChange::Insert(CharacterId(t * 100 + i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.drain().len(), 100);
    }
}
