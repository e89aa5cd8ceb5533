//! 挂点处理顺序
//!
//! 挂点按类别稳定排序成若干连续区间，更新与渲染按区间批量处理，
//! 热循环中不需要逐个判断类型。缓冲区只保存挂点索引，挂点列表本身不重排。

use std::ops::Range;

use crate::skeleton::DefaultSkeleton;

use super::object::ObjectKind;
use super::variant::Attachment;

/// 控制次级运动权重的骨骼名
pub const BLEND_WEIGHT_JOINT_NAME: &str = "all_blendWeightPendulum";

/// 处理区间，按声明顺序排列
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessingRange {
    /// 模拟结果写回骨骼的骨骼挂点，区间内按骨骼索引排序
    BoneRedirect,
    BoneEmpty,
    BoneStatic,
    BoneExecute,
    /// 实体、光源、特效：更新时会访问外部系统
    BoneExecuteUnsafe,
    FaceEmpty,
    FaceStatic,
    FaceExecute,
    FaceExecuteUnsafe,
    SkinMesh,
    VClothOrPendulumRow,
}

impl ProcessingRange {
    pub const COUNT: usize = 11;

    pub const ALL: [ProcessingRange; Self::COUNT] = [
        ProcessingRange::BoneRedirect,
        ProcessingRange::BoneEmpty,
        ProcessingRange::BoneStatic,
        ProcessingRange::BoneExecute,
        ProcessingRange::BoneExecuteUnsafe,
        ProcessingRange::FaceEmpty,
        ProcessingRange::FaceStatic,
        ProcessingRange::FaceExecute,
        ProcessingRange::FaceExecuteUnsafe,
        ProcessingRange::SkinMesh,
        ProcessingRange::VClothOrPendulumRow,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 挂点所属区间
    pub fn classify(attachment: &Attachment) -> Self {
        let kind = attachment.object().map(|o| o.kind());
        match attachment {
            Attachment::Bone(bone) if bone.is_redirect() => ProcessingRange::BoneRedirect,
            Attachment::Bone(_) => match kind {
                None => ProcessingRange::BoneEmpty,
                Some(ObjectKind::StatObj | ObjectKind::SkinMesh) => ProcessingRange::BoneStatic,
                Some(ObjectKind::Skeleton) => ProcessingRange::BoneExecute,
                Some(ObjectKind::Entity | ObjectKind::Light | ObjectKind::Effect) => {
                    ProcessingRange::BoneExecuteUnsafe
                }
            },
            Attachment::Face(_) => match kind {
                None => ProcessingRange::FaceEmpty,
                Some(ObjectKind::StatObj | ObjectKind::SkinMesh) => ProcessingRange::FaceStatic,
                Some(ObjectKind::Skeleton) => ProcessingRange::FaceExecute,
                Some(ObjectKind::Entity | ObjectKind::Light | ObjectKind::Effect) => {
                    ProcessingRange::FaceExecuteUnsafe
                }
            },
            Attachment::Skin(_) => ProcessingRange::SkinMesh,
            Attachment::VCloth(_) | Attachment::PendulumRow(_) => ProcessingRange::VClothOrPendulumRow,
        }
    }
}

/// 按区间排好序的挂点索引
#[derive(Clone, Debug)]
pub struct ProcessingBuffer {
    order: Vec<usize>,
    ranges: [Range<usize>; ProcessingRange::COUNT],
    dirty: bool,
    /// 有绑定对象的重定向挂点数
    redirect_with_object: usize,
}

impl Default for ProcessingBuffer {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            ranges: std::array::from_fn(|_| 0..0),
            dirty: true,
            redirect_with_object: 0,
        }
    }
}

impl ProcessingBuffer {
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 全部挂点索引（按区间排列）
    #[inline]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// 区间在 `order` 中的位置
    #[inline]
    pub fn bounds(&self, range: ProcessingRange) -> Range<usize> {
        self.ranges[range.index()].clone()
    }

    /// 区间内的挂点索引
    #[inline]
    pub fn range(&self, range: ProcessingRange) -> &[usize] {
        &self.order[self.bounds(range)]
    }

    /// 连续多个区间的挂点索引
    pub fn span(&self, first: ProcessingRange, last: ProcessingRange) -> &[usize] {
        let begin = self.ranges[first.index()].start;
        let end = self.ranges[last.index()].end.max(begin);
        &self.order[begin..end]
    }

    #[inline]
    pub fn redirect_with_object(&self) -> usize {
        self.redirect_with_object
    }

    /// 重新解析骨骼并重建区间
    pub(crate) fn rebuild(&mut self, attachments: &mut [Attachment], skeleton: &DefaultSkeleton) {
        for attachment in attachments.iter_mut() {
            if let Attachment::Bone(bone) = attachment {
                bone.resolve_joint(skeleton);
            }
        }

        let keys: Vec<(ProcessingRange, i32)> = attachments
            .iter()
            .map(|a| {
                let range = ProcessingRange::classify(a);
                let joint = if range == ProcessingRange::BoneRedirect { a.joint_id() } else { 0 };
                (range, joint)
            })
            .collect();

        self.order.clear();
        self.order.extend(0..attachments.len());
        // 稳定排序：同一区间内保持创建顺序
        self.order.sort_by_key(|&i| keys[i]);

        let mut start = 0;
        for range in ProcessingRange::ALL {
            let count = keys.iter().filter(|(r, _)| *r == range).count();
            self.ranges[range.index()] = start..start + count;
            start += count;
        }

        self.redirect_with_object = 0;
        let blend_weight_joint = skeleton.joint_id_by_name(BLEND_WEIGHT_JOINT_NAME);
        for &i in &self.order[self.ranges[ProcessingRange::BoneRedirect.index()].clone()] {
            let Attachment::Bone(bone) = &mut attachments[i] else {
                continue;
            };
            if bone.base.object.is_some() {
                self.redirect_with_object += 1;
            }
            let joint = bone.joint_id;
            let dir_trans = skeleton.joint_id_by_name(&bone.simulation.params.dir_trans_joint);
            let sim = &mut bone.simulation;
            sim.anim_override_joint = blend_weight_joint;
            sim.dir_trans_joint = dir_trans;
            sim.redirect_children = if joint >= 0 {
                descendants(skeleton.parents(), joint as usize)
            } else {
                Vec::new()
            };
        }

        for &i in self.range(ProcessingRange::VClothOrPendulumRow) {
            if let Attachment::PendulumRow(row) = &mut attachments[i] {
                row.rebuild(skeleton);
            }
        }
        for attachment in attachments.iter_mut() {
            if let Attachment::Bone(bone) = attachment {
                if !bone.is_redirect() {
                    bone.simulation.dir_trans_joint =
                        skeleton.joint_id_by_name(&bone.simulation.params.dir_trans_joint);
                }
            }
        }

        self.dirty = false;
        log::debug!(
            "[Attachment] 处理区间重建: {} 个挂点, {} 个重定向",
            attachments.len(),
            self.ranges[ProcessingRange::BoneRedirect.index()].len()
        );
    }
}

/// 骨骼的全部子孙（升序）
///
/// 父索引总小于子索引，所以一次升序扫描即可完成洪泛填充。
pub(crate) fn descendants(parents: &[i32], joint: usize) -> Vec<usize> {
    let mut marked = vec![false; parents.len()];
    if joint < marked.len() {
        marked[joint] = true;
    }
    let mut out = Vec::new();
    for i in joint + 1..parents.len() {
        let parent = parents[i];
        if parent >= 0 && marked[parent as usize] {
            marked[i] = true;
            out.push(i);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_flood_fill() {
        // 0 -> 1 -> 2, 0 -> 3, 1 -> 4
        let parents = [-1, 0, 1, 0, 1];
        assert_eq!(descendants(&parents, 1), vec![2, 4]);
        assert_eq!(descendants(&parents, 0), vec![1, 2, 3, 4]);
        assert!(descendants(&parents, 2).is_empty());
    }

    #[test]
    fn test_range_order_matches_declaration() {
        for (i, r) in ProcessingRange::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }
}
