//! 挂点管理器
//!
//! 每个角色实例持有一个管理器，负责：
//! - 挂点与代理体的创建、查找、删除
//! - 绑定修改的延迟执行（`update_bindings`）
//! - 处理区间的惰性重建
//! - 每帧向命令缓冲区追加挂点命令，并在姿态计算结束后更新挂点与子角色

use std::sync::Arc;

use crate::character::CharacterId;
use crate::command::{
    CommandBuffer, GenerateProxyModelRelativeTransformations, PrepareAllRedirectedTransformations,
    UpdatePendulumRow, UpdateRedirectedJoint,
};
use crate::config::{AnimationConfig, FrameContext};
use crate::error::{AnimError, Result};
use crate::math::{crc32_lowercase, QuatT, QuatTS};
use crate::skeleton::{DefaultSkeleton, PoseData};

use super::attached_cache::{AttachedChange, AttachedCharacterCache};
use super::base::{AttachmentBase, AttachmentType};
use super::bone::BoneAttachment;
use super::face::FaceAttachment;
use super::flags::{AttachmentFlags, RenderPass};
use super::modification::{ModificationCommand, ModificationCommandBuffer};
use super::object::{AttachmentObject, ObjectKind};
use super::processing_buffer::{ProcessingBuffer, ProcessingRange};
use super::proxy::{Proxy, DEFAULT_PROXY_PARAMS};
use super::row::PendulumRowAttachment;
use super::simulation::SimulationContext;
use super::skin::SkinAttachment;
use super::variant::Attachment;
use super::vcloth::VClothAttachment;

/// 绑定对象本帧的世界变换与渲染标志
#[derive(Clone, Debug, PartialEq)]
pub struct AttachedObjectUpdate {
    /// 挂点索引
    pub attachment: usize,
    pub kind: ObjectKind,
    pub world: QuatTS,
    /// 挂点自身与父渲染节点合并后的隐藏标志
    pub hidden: AttachmentFlags,
    /// 距离剔除结果
    pub visible: bool,
    /// 子角色句柄（仅 Skeleton 对象）
    pub character: Option<CharacterId>,
}

impl AttachedObjectUpdate {
    /// 在给定通道中是否需要渲染
    #[inline]
    pub fn is_rendered_in(&self, pass: RenderPass) -> bool {
        self.visible && !self.hidden.intersects(pass.hide_flag())
    }
}

/// 挂点管理器
#[derive(Debug)]
pub struct AttachmentManager {
    skeleton: Arc<DefaultSkeleton>,
    attachments: Vec<Attachment>,
    proxies: Vec<Proxy>,
    processing: ProcessingBuffer,
    modifications: ModificationCommandBuffer,
    attached_cache: Arc<AttachedCharacterCache>,
    /// 已绑定的子角色（由 `process_changes` 维护）
    attached: Vec<CharacterId>,
    /// 骨骼链湍流相位
    turbulence: f32,
}

impl AttachmentManager {
    pub fn new(skeleton: Arc<DefaultSkeleton>, config: &AnimationConfig) -> Self {
        Self {
            skeleton,
            attachments: Vec::new(),
            proxies: Vec::new(),
            processing: ProcessingBuffer::default(),
            modifications: ModificationCommandBuffer::default(),
            attached_cache: Arc::new(AttachedCharacterCache::new(config.attached_cache_capacity)),
            attached: Vec::new(),
            turbulence: 0.0,
        }
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<DefaultSkeleton> {
        &self.skeleton
    }

    #[inline]
    pub fn processing(&self) -> &ProcessingBuffer {
        &self.processing
    }

    // ========================================
    // 挂点增删
    // ========================================

    /// 创建挂点，返回索引
    ///
    /// 名称转小写后与已有挂点重名，或小写 CRC 冲突时失败。
    /// 骨骼挂点与骨骼链挂点需要骨骼名；骨骼名无法解析时仍然创建，挂点不工作。
    pub fn create_attachment(&mut self, name: &str, ty: AttachmentType, joint_name: &str) -> Result<usize> {
        let base = AttachmentBase::new(name)?;

        if self.index_by_name(base.name()).is_some() {
            log::warn!("[Attachment] 挂点名 '{}' 已被使用，不创建", base.name());
            return Err(AnimError::DuplicateAttachment {
                name: base.name().to_string(),
                crc: base.name_crc(),
            });
        }
        if let Some(existing) = self.index_by_crc(base.name_crc()) {
            log::warn!(
                "[Attachment] 挂点 '{}' 的 CRC 与 '{}' 冲突，不创建",
                base.name(),
                self.attachments[existing].name()
            );
            return Err(AnimError::DuplicateAttachment {
                name: base.name().to_string(),
                crc: base.name_crc(),
            });
        }
        if ty.requires_joint() && joint_name.is_empty() {
            return Err(AnimError::JointNotFound(String::new()));
        }

        let attachment = match ty {
            AttachmentType::Bone => {
                let mut bone = BoneAttachment::new(base, joint_name);
                bone.project_attachment(&self.skeleton);
                Attachment::Bone(bone)
            }
            AttachmentType::Face => Attachment::Face(FaceAttachment::new(base)),
            AttachmentType::Skin => Attachment::Skin(SkinAttachment::new(base)),
            AttachmentType::VCloth => Attachment::VCloth(VClothAttachment::new(base)),
            AttachmentType::PendulumRow => {
                Attachment::PendulumRow(PendulumRowAttachment::new(base, joint_name))
            }
            AttachmentType::Proxy => {
                return Err(AnimError::InvalidAttachmentType(ty.type_name().to_string()));
            }
        };

        self.attachments.push(attachment);
        self.processing.mark_dirty();
        Ok(self.attachments.len() - 1)
    }

    /// 按索引删除挂点，绑定的子角色会被移出
    pub fn remove_attachment_by_index(&mut self, index: usize) -> bool {
        if index >= self.attachments.len() {
            return false;
        }
        let mut attachment = self.attachments.remove(index);
        if let Some(id) = attachment.unbind().and_then(|o| o.character()) {
            self.attached_cache.push(AttachedChange::Erase(id));
        }
        self.processing.mark_dirty();
        true
    }

    pub fn remove_attachment_by_name(&mut self, name: &str) -> bool {
        match self.index_by_name(name) {
            Some(index) => self.remove_attachment_by_index(index),
            None => false,
        }
    }

    pub fn remove_attachment_by_crc(&mut self, crc: u32) -> bool {
        match self.index_by_crc(crc) {
            Some(index) => self.remove_attachment_by_index(index),
            None => false,
        }
    }

    pub fn remove_all_attachments(&mut self) {
        while !self.attachments.is_empty() {
            self.remove_attachment_by_index(self.attachments.len() - 1);
        }
    }

    // ========================================
    // 查找
    // ========================================

    #[inline]
    pub fn count(&self) -> usize {
        self.attachments.len()
    }

    #[inline]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Attachment> {
        self.attachments.get(index)
    }

    /// 可变访问会使处理区间失效（挂点可能被改成重定向）
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Attachment> {
        let attachment = self.attachments.get_mut(index)?;
        self.processing.mark_dirty();
        Some(attachment)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Attachment> {
        self.index_by_name(name).map(|i| &self.attachments[i])
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut Attachment> {
        let index = self.index_by_name(name)?;
        self.get_mut(index)
    }

    pub fn get_by_crc(&self, crc: u32) -> Option<&Attachment> {
        self.index_by_crc(crc).map(|i| &self.attachments[i])
    }

    /// 名称比较不区分大小写，与创建时的小写规则一致
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.attachments.iter().position(|a| a.name() == lower)
    }

    pub fn index_by_crc(&self, crc: u32) -> Option<usize> {
        self.attachments.iter().position(|a| a.name_crc() == crc)
    }

    /// 清除全部挂点的 PROJECTED 标志，下次更新时重新投影
    pub fn project_all_attachments(&mut self) {
        for attachment in &mut self.attachments {
            attachment.base_mut().flags.remove(AttachmentFlags::PROJECTED);
        }
    }

    // ========================================
    // 代理体
    // ========================================

    /// 在骨骼绑定姿态处创建代理体，返回索引
    pub fn create_proxy(&mut self, name: &str, joint_name: &str) -> Result<usize> {
        let lower = name.to_lowercase();
        let crc = crc32_lowercase(&lower);
        if self.proxy_index_by_name(&lower).is_some() || self.proxy_index_by_crc(crc).is_some() {
            log::warn!("[Attachment] 代理体名 '{}' 已被使用，不创建", lower);
            return Err(AnimError::DuplicateAttachment { name: lower, crc });
        }
        let joint = self.skeleton.joint_id_by_name(joint_name);
        if joint < 0 {
            log::error!("[Attachment] 代理体 '{}' 的骨骼 '{}' 不存在", lower, joint_name);
            return Err(AnimError::JointNotFound(joint_name.to_string()));
        }

        let joint_default = self.skeleton.default_absolute(joint as usize);
        let mut proxy = Proxy::new(&lower, joint_name, joint_default, DEFAULT_PROXY_PARAMS, 0);
        proxy.joint_id = joint;
        proxy.project(joint_default);
        self.proxies.push(proxy);
        Ok(self.proxies.len() - 1)
    }

    /// 加入已配置好的代理体（定义文件加载使用）
    pub(crate) fn push_proxy(&mut self, proxy: Proxy) -> Result<usize> {
        if self.proxy_index_by_crc(proxy.name_crc()).is_some() {
            log::warn!("[Attachment] 代理体名 '{}' 已被使用，不创建", proxy.name());
            return Err(AnimError::DuplicateAttachment {
                name: proxy.name().to_string(),
                crc: proxy.name_crc(),
            });
        }
        self.proxies.push(proxy);
        Ok(self.proxies.len() - 1)
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    #[inline]
    pub fn proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    #[inline]
    pub fn proxy(&self, index: usize) -> Option<&Proxy> {
        self.proxies.get(index)
    }

    #[inline]
    pub fn proxy_mut(&mut self, index: usize) -> Option<&mut Proxy> {
        self.proxies.get_mut(index)
    }

    pub fn proxy_by_name(&self, name: &str) -> Option<&Proxy> {
        self.proxy_index_by_name(name).map(|i| &self.proxies[i])
    }

    pub fn proxy_index_by_name(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.proxies.iter().position(|p| p.name() == lower)
    }

    pub fn proxy_index_by_crc(&self, crc: u32) -> Option<usize> {
        self.proxies.iter().position(|p| p.name_crc() == crc)
    }

    /// 删除代理体（末尾代理体移到被删位置），随后重新整理代理引用
    pub fn remove_proxy_by_index(&mut self, index: usize) -> bool {
        if index >= self.proxies.len() {
            return false;
        }
        self.proxies.swap_remove(index);
        self.verify_proxy_links();
        true
    }

    pub fn remove_proxy_by_name(&mut self, name: &str) -> bool {
        match self.proxy_index_by_name(name) {
            Some(index) => self.remove_proxy_by_index(index),
            None => false,
        }
    }

    pub fn remove_proxy_by_crc(&mut self, crc: u32) -> bool {
        match self.proxy_index_by_crc(crc) {
            Some(index) => self.remove_proxy_by_index(index),
            None => false,
        }
    }

    /// 重新解析代理体骨骼，并把模拟参数中的代理名映射为索引
    ///
    /// 骨骼无法解析的代理体被删除；找不到的代理名从列表中去掉。
    pub fn verify_proxy_links(&mut self) {
        let skeleton = &self.skeleton;
        self.proxies.retain_mut(|proxy| {
            let joint = skeleton.joint_id_by_name(proxy.joint_name());
            if joint < 0 {
                log::error!(
                    "[Attachment] 代理体 '{}' 的骨骼 '{}' 不存在，已删除",
                    proxy.name(),
                    proxy.joint_name()
                );
                return false;
            }
            proxy.joint_id = joint;
            proxy.project(skeleton.default_absolute(joint as usize));
            true
        });

        let proxies = &self.proxies;
        let resolve = |names: &mut Vec<String>| -> Vec<usize> {
            let mut indices = Vec::with_capacity(names.len());
            names.retain(|name| {
                let crc = crc32_lowercase(name);
                match proxies.iter().position(|p| p.name_crc() == crc) {
                    Some(i) => {
                        indices.push(i);
                        true
                    }
                    None => false,
                }
            });
            indices
        };

        for attachment in &mut self.attachments {
            match attachment {
                Attachment::Bone(bone) => {
                    let sim = &mut bone.simulation;
                    sim.proxy_indices = resolve(&mut sim.params.proxy_names);
                }
                Attachment::Face(face) => {
                    let sim = &mut face.simulation;
                    sim.proxy_indices = resolve(&mut sim.params.proxy_names);
                }
                Attachment::PendulumRow(row) => {
                    row.proxy_indices = resolve(&mut row.params.proxy_names);
                }
                Attachment::Skin(_) | Attachment::VCloth(_) => {}
            }
        }
    }

    // ========================================
    // 绑定（延迟执行）
    // ========================================

    /// 记录绑定对象，`update_bindings` 时生效
    pub fn add_binding(&mut self, name: &str, object: AttachmentObject) -> Result<()> {
        let target_crc = self.require_crc(name)?;
        self.modifications
            .push(ModificationCommand::AddBinding { target_crc, object });
        Ok(())
    }

    pub fn clear_binding(&mut self, name: &str) -> Result<()> {
        let target_crc = self.require_crc(name)?;
        self.modifications
            .push(ModificationCommand::ClearBinding { target_crc });
        Ok(())
    }

    /// 交换两个挂点的绑定对象
    pub fn swap_binding(&mut self, name: &str, other: &str) -> Result<()> {
        let target_crc = self.require_crc(name)?;
        let other_crc = self.require_crc(other)?;
        self.modifications.push(ModificationCommand::SwapBinding {
            target_crc,
            other_crc,
        });
        Ok(())
    }

    fn require_crc(&self, name: &str) -> Result<u32> {
        self.get_by_name(name)
            .map(|a| a.name_crc())
            .ok_or_else(|| AnimError::AttachmentNotFound(name.to_string()))
    }

    #[inline]
    pub fn pending_modifications(&self) -> usize {
        self.modifications.len()
    }

    /// 执行全部延迟的绑定修改
    pub fn update_bindings(&mut self) {
        if self.modifications.is_empty() {
            return;
        }
        let commands: Vec<ModificationCommand> = self.modifications.drain().collect();
        for command in commands {
            let Some(index) = self.index_by_crc(command.target_crc()) else {
                log::warn!(
                    "[Attachment] 绑定修改的目标挂点 0x{:08x} 已不存在",
                    command.target_crc()
                );
                continue;
            };
            match command {
                ModificationCommand::AddBinding { object, .. } => {
                    self.release_object(index);
                    self.bind_immediate(index, object);
                }
                ModificationCommand::ClearBinding { .. } => {
                    self.release_object(index);
                }
                ModificationCommand::SwapBinding { other_crc, .. } => {
                    let Some(other) = self.index_by_crc(other_crc) else {
                        log::warn!("[Attachment] 交换绑定的挂点 0x{:08x} 已不存在", other_crc);
                        continue;
                    };
                    let a = self.attachments[index].unbind();
                    let b = self.attachments[other].unbind();
                    if let Some(b) = b {
                        self.rebind_swapped(index, b);
                    }
                    if let Some(a) = a {
                        self.rebind_swapped(other, a);
                    }
                }
            }
        }
        self.processing.mark_dirty();
    }

    /// 立即绑定；子角色写入变更日志
    pub(crate) fn bind_immediate(&mut self, index: usize, object: AttachmentObject) -> bool {
        let character = object.character();
        let bound = self.attachments[index].bind(object, &self.skeleton);
        if bound {
            if let Some(id) = character {
                self.attached_cache.push(AttachedChange::Insert(id));
            }
        }
        bound
    }

    fn release_object(&mut self, index: usize) {
        if let Some(id) = self.attachments[index].unbind().and_then(|o| o.character()) {
            self.attached_cache.push(AttachedChange::Erase(id));
        }
    }

    /// 交换后重新绑定；失败时子角色从列表移出
    fn rebind_swapped(&mut self, index: usize, object: AttachmentObject) {
        let character = object.character();
        if !self.attachments[index].bind(object, &self.skeleton) {
            if let Some(id) = character {
                self.attached_cache.push(AttachedChange::Erase(id));
            }
        }
    }

    // ========================================
    // 子角色
    // ========================================

    /// 其他线程记录子角色变更用的句柄
    #[inline]
    pub fn attached_cache(&self) -> Arc<AttachedCharacterCache> {
        Arc::clone(&self.attached_cache)
    }

    /// 取出变更日志，更新子角色列表
    pub fn process_changes(&mut self) {
        for change in self.attached_cache.drain() {
            match change {
                AttachedChange::Insert(id) => {
                    if !self.attached.contains(&id) {
                        self.attached.push(id);
                    }
                }
                AttachedChange::Erase(id) => self.attached.retain(|&c| c != id),
            }
        }
    }

    #[inline]
    pub fn attached_characters(&self) -> &[CharacterId] {
        &self.attached
    }

    // ========================================
    // 每帧
    // ========================================

    fn ensure_sorted(&mut self) {
        if self.processing.is_dirty() {
            self.processing.rebuild(&mut self.attachments, &self.skeleton);
        }
    }

    /// 追加本帧的挂点命令
    pub fn create_commands(&mut self, buffer: &mut CommandBuffer) {
        self.ensure_sorted();
        buffer.create_command(PrepareAllRedirectedTransformations);
        for &index in self.processing.range(ProcessingRange::BoneRedirect) {
            buffer.create_command(UpdateRedirectedJoint {
                attachment: command_index(index),
            });
        }
        buffer.create_command(GenerateProxyModelRelativeTransformations);
        for &index in self.processing.range(ProcessingRange::VClothOrPendulumRow) {
            if matches!(self.attachments[index], Attachment::PendulumRow(_)) {
                buffer.create_command(UpdatePendulumRow {
                    attachment: command_index(index),
                });
            }
        }
    }

    /// 由当前绝对姿态计算代理体模型空间变换，并推进湍流相位
    pub fn prepare_all_redirected_transformations(&mut self, pose: &PoseData, frame: &FrameContext) {
        self.ensure_sorted();
        self.turbulence += std::f32::consts::PI * frame.delta_time.max(0.0);
        for proxy in &mut self.proxies {
            if proxy.joint_id >= 0 && (proxy.joint_id as usize) < pose.joint_count() {
                proxy.model_relative = pose.absolute(proxy.joint_id as usize) * proxy.relative_default;
            }
        }
    }

    /// 更新一个重定向挂点；索引不是重定向骨骼挂点时返回 false
    pub fn update_redirected_joint(
        &mut self,
        index: usize,
        pose: &mut PoseData,
        sim: &SimulationContext<'_>,
    ) -> bool {
        match self.attachments.get_mut(index) {
            Some(Attachment::Bone(bone)) if bone.is_redirect() => {
                bone.update_redirected(pose, &self.skeleton, &self.proxies, sim);
                true
            }
            _ => false,
        }
    }

    /// 保存代理体上一帧的变换
    pub fn generate_proxy_model_relative_transformations(&mut self) {
        for proxy in &mut self.proxies {
            proxy.model_relative_prev = proxy.model_relative.normalized();
        }
    }

    /// 更新一个骨骼链挂点；索引不是骨骼链挂点时返回 false
    pub fn update_pendulum_row(
        &mut self,
        index: usize,
        pose: &mut PoseData,
        sim: &SimulationContext<'_>,
    ) -> bool {
        let phase = self.turbulence;
        match self.attachments.get_mut(index) {
            Some(Attachment::PendulumRow(row)) => {
                row.update(pose, &self.skeleton, &self.proxies, sim, phase);
                true
            }
            _ => false,
        }
    }

    /// 姿态计算完成后按区间更新骨骼挂点、面挂点与蒙皮
    pub fn update_sockets(&mut self, pose: &PoseData, sim: &SimulationContext<'_>) {
        self.ensure_sorted();
        let skeleton = &*self.skeleton;
        let proxies = &self.proxies;
        let attachments = &mut self.attachments;

        for &i in self.processing.range(ProcessingRange::BoneEmpty) {
            if let Attachment::Bone(bone) = &mut attachments[i] {
                bone.update_empty(pose, skeleton);
            }
        }
        // Static 区间只按绑定对象类型划分；设置了摆锤或弹簧的静态模型同样积分，
        // 未设置时附加变换恒为单位
        for &i in self
            .processing
            .span(ProcessingRange::BoneStatic, ProcessingRange::BoneExecuteUnsafe)
        {
            if let Attachment::Bone(bone) = &mut attachments[i] {
                bone.update_execute(pose, skeleton, proxies, sim);
            }
        }
        // 面挂点的空挂点只在最高 LOD 更新
        if sim.frame.animation_lod < 1 {
            for &i in self.processing.range(ProcessingRange::FaceEmpty) {
                if let Attachment::Face(face) = &mut attachments[i] {
                    face.update_empty();
                }
            }
        }
        for &i in self
            .processing
            .span(ProcessingRange::FaceStatic, ProcessingRange::FaceExecuteUnsafe)
        {
            if let Attachment::Face(face) = &mut attachments[i] {
                face.update_execute(pose, proxies, sim);
            }
        }
        for &i in self.processing.range(ProcessingRange::SkinMesh) {
            if let Attachment::Skin(skin) = &mut attachments[i] {
                skin.update_skinning(pose, skeleton);
            }
        }
        for &i in self.processing.range(ProcessingRange::VClothOrPendulumRow) {
            if let Attachment::VCloth(cloth) = &mut attachments[i] {
                cloth.update_skinning(pose, skeleton);
            }
        }
    }

    /// 计算绑定对象的世界变换，合并父渲染节点的隐藏标志
    pub fn update_attached_objects(
        &mut self,
        location: &QuatTS,
        parent_hidden: AttachmentFlags,
    ) -> Vec<AttachedObjectUpdate> {
        self.ensure_sorted();
        let inherited = parent_hidden & AttachmentFlags::HIDE_ALL_PASSES;
        let mut updates = Vec::new();

        // 重定向挂点大多没有绑定对象
        let first = if self.processing.redirect_with_object() > 0 {
            ProcessingRange::BoneRedirect
        } else {
            ProcessingRange::BoneStatic
        };
        let sockets = self
            .processing
            .span(first, ProcessingRange::FaceExecuteUnsafe)
            .iter()
            .chain(self.processing.span(ProcessingRange::SkinMesh, ProcessingRange::VClothOrPendulumRow));

        for &i in sockets {
            let attachment = &self.attachments[i];
            let Some(object) = attachment.object() else {
                continue;
            };
            let (world, visible) = match attachment {
                Attachment::Bone(bone) => {
                    if bone.joint_id() < 0 {
                        continue;
                    }
                    let visible = bone.is_redirect() || attachment.flags().contains(AttachmentFlags::VISIBLE);
                    (bone.world_transform(location), visible)
                }
                Attachment::Face(face) => (
                    face.world_transform(location),
                    attachment.flags().contains(AttachmentFlags::VISIBLE),
                ),
                // 蒙皮顶点已在模型空间，跟随角色位置
                Attachment::Skin(_) | Attachment::VCloth(_) => (*location, true),
                Attachment::PendulumRow(_) => continue,
            };
            updates.push(AttachedObjectUpdate {
                attachment: i,
                kind: object.kind(),
                world,
                hidden: (attachment.flags() & AttachmentFlags::HIDE_ALL_PASSES) | inherited,
                visible,
                character: object.character(),
            });
        }
        updates
    }

    /// 挂点的世界变换
    pub fn attachment_world_transform(&self, index: usize, location: &QuatTS) -> Option<QuatTS> {
        self.attachments.get(index).map(|a| a.world_transform(location))
    }

    /// 挂点的模型空间变换（含附加变换）
    pub fn attachment_model_transform(&self, index: usize) -> Option<QuatT> {
        self.attachments
            .get(index)
            .map(|a| a.model_relative() * a.add_transformation())
    }

    /// 快照与恢复用：模块内访问挂点列表
    pub(crate) fn attachments_mut(&mut self) -> &mut [Attachment] {
        &mut self.attachments
    }
}

impl Drop for AttachmentManager {
    fn drop(&mut self) {
        // 未执行的修改里可能持有子角色句柄，执行后日志才完整
        self.update_bindings();
    }
}

fn command_index(index: usize) -> u16 {
    match u16::try_from(index) {
        Ok(i) => i,
        Err(_) => panic!("[Attachment] 挂点索引 {} 超出命令可表示范围", index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::simulation::{ClampType, Simulation, SimulationParams};
    use crate::skeleton::JointDesc;
    use glam::{Quat, Vec3};

    fn skeleton() -> Arc<DefaultSkeleton> {
        let joints = [
            JointDesc::new("root", -1, QuatT::IDENTITY),
            JointDesc::new("spine", 0, QuatT::from_translation(Vec3::new(0.0, 0.0, 1.0))),
            JointDesc::new("head", 1, QuatT::from_translation(Vec3::new(0.0, 0.0, 0.5))),
        ];
        Arc::new(DefaultSkeleton::build(&joints).unwrap())
    }

    fn manager() -> AttachmentManager {
        AttachmentManager::new(skeleton(), &AnimationConfig::default())
    }

    #[test]
    fn test_duplicate_name_case_insensitive() {
        let mut m = manager();
        assert_eq!(m.create_attachment("Hat", AttachmentType::Bone, "head"), Ok(0));
        let err = m.create_attachment("hat", AttachmentType::Bone, "head").unwrap_err();
        assert!(matches!(err, AnimError::DuplicateAttachment { .. }));
        assert_eq!(m.count(), 1);
    }

    #[test]
    fn test_lookup_non_ascii_name() {
        let mut m = manager();
        m.create_attachment("Ärmel", AttachmentType::Face, "").unwrap();
        assert_eq!(m.index_by_name("ÄRMEL"), Some(0));
        assert_eq!(m.index_by_name("ärmel"), Some(0));
        assert!(m.create_attachment("äRMEL", AttachmentType::Face, "").is_err());
        assert_eq!(m.index_by_crc(crc32_lowercase("ÄRMEL")), Some(0));
        assert!(m.remove_attachment_by_name("ÄrMeL"));

        m.create_proxy("Ölkanne", "spine").unwrap();
        assert_eq!(m.proxy_index_by_name("ÖLKANNE"), Some(0));
    }

    #[test]
    fn test_bone_requires_joint_name() {
        let mut m = manager();
        assert_eq!(
            m.create_attachment("hat", AttachmentType::Bone, ""),
            Err(AnimError::JointNotFound(String::new()))
        );
        // 无法解析的骨骼名仍然创建
        let idx = m.create_attachment("ghost", AttachmentType::Bone, "tail").unwrap();
        assert_eq!(m.get(idx).unwrap().joint_id(), -1);
    }

    #[test]
    fn test_unresolved_joint_in_redirect_and_socket_ranges() {
        let mut m = manager();
        let redirect = m.create_attachment("braid", AttachmentType::Bone, "tail").unwrap();
        let socket = m.create_attachment("charm", AttachmentType::Bone, "tail").unwrap();
        *m.get_mut(redirect).unwrap().as_bone_mut().unwrap().simulation_mut() = Simulation::new(SimulationParams {
            clamp_type: ClampType::PendulumCone,
            use_redirect: true,
            ..Default::default()
        });
        m.add_binding("charm", AttachmentObject::StatObj { name: "charm.cgf".into(), radius: 0.0 })
            .unwrap();
        m.update_bindings();

        let mut pose = PoseData::from_default(m.skeleton());
        let before = pose.clone();
        let config = AnimationConfig::default();
        let frame = FrameContext::with_delta(1.0 / 30.0);
        let sim = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        for _ in 0..2 {
            assert!(m.update_redirected_joint(redirect, &mut pose, &sim));
            m.update_sockets(&pose, &sim);
        }

        // 挂点保留但不工作，姿态不受影响
        assert_eq!(pose, before);
        for index in [redirect, socket] {
            let bone = m.get(index).unwrap().as_bone().unwrap();
            assert_eq!(bone.joint_id(), -1);
            assert_eq!(bone.model_relative(), QuatT::IDENTITY);
        }
    }

    #[test]
    fn test_static_range_simulates_only_with_clamp_type() {
        let mut m = manager();
        for name in ["earring", "badge"] {
            m.create_attachment(name, AttachmentType::Bone, "head").unwrap();
            m.add_binding(name, AttachmentObject::StatObj { name: format!("{name}.cgf"), radius: 0.0 })
                .unwrap();
        }
        *m.get_mut(0).unwrap().as_bone_mut().unwrap().simulation_mut() = Simulation::new(SimulationParams {
            clamp_type: ClampType::PendulumCone,
            max_angle: 45.0,
            ..Default::default()
        });
        m.update_bindings();

        let pose = PoseData::from_default(m.skeleton());
        let config = AnimationConfig::default();
        let frame = FrameContext::with_delta(1.0 / 30.0);
        let sim = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        for _ in 0..30 {
            m.update_sockets(&pose, &sim);
        }

        assert_eq!(m.processing().range(ProcessingRange::BoneStatic), &[0, 1]);
        // 摆锤在重力下偏离静止位置
        let earring = m.get(0).unwrap().as_bone().unwrap();
        assert_ne!(earring.add_transformation(), QuatT::IDENTITY);
        let badge = m.get(1).unwrap().as_bone().unwrap();
        assert_eq!(badge.add_transformation(), QuatT::IDENTITY);
    }

    #[test]
    fn test_proxy_type_rejected() {
        let mut m = manager();
        assert!(matches!(
            m.create_attachment("p", AttachmentType::Proxy, "head"),
            Err(AnimError::InvalidAttachmentType(_))
        ));
    }

    #[test]
    fn test_remove_by_name_and_crc() {
        let mut m = manager();
        m.create_attachment("a", AttachmentType::Face, "").unwrap();
        m.create_attachment("b", AttachmentType::Skin, "").unwrap();
        assert!(m.remove_attachment_by_name("A"));
        assert!(!m.remove_attachment_by_name("a"));
        assert!(m.remove_attachment_by_crc(crc32_lowercase("b")));
        assert_eq!(m.count(), 0);
    }

    #[test]
    fn test_bindings_are_deferred() {
        let mut m = manager();
        m.create_attachment("weapon", AttachmentType::Bone, "head").unwrap();
        m.add_binding("weapon", AttachmentObject::Skeleton(CharacterId(7))).unwrap();
        assert!(m.get(0).unwrap().object().is_none());
        assert_eq!(m.pending_modifications(), 1);

        m.update_bindings();
        assert!(m.get(0).unwrap().object().is_some());
        assert!(m.attached_characters().is_empty());
        m.process_changes();
        assert_eq!(m.attached_characters(), &[CharacterId(7)]);

        m.clear_binding("weapon").unwrap();
        m.update_bindings();
        m.process_changes();
        assert!(m.attached_characters().is_empty());
    }

    #[test]
    fn test_swap_binding() {
        let mut m = manager();
        m.create_attachment("left", AttachmentType::Bone, "spine").unwrap();
        m.create_attachment("right", AttachmentType::Bone, "head").unwrap();
        m.add_binding("left", AttachmentObject::Entity { id: 3 }).unwrap();
        m.swap_binding("left", "right").unwrap();
        m.update_bindings();
        assert!(m.get(0).unwrap().object().is_none());
        assert_eq!(m.get(1).unwrap().object(), Some(&AttachmentObject::Entity { id: 3 }));
    }

    #[test]
    fn test_binding_unknown_attachment() {
        let mut m = manager();
        assert_eq!(
            m.clear_binding("nothing"),
            Err(AnimError::AttachmentNotFound("nothing".to_string()))
        );
    }

    #[test]
    fn test_proxy_links() {
        let mut m = manager();
        m.create_proxy("Chest", "spine").unwrap();
        m.create_proxy("skull", "head").unwrap();
        assert!(m.create_proxy("chest", "head").is_err());
        assert!(m.create_proxy("tail", "tail").is_err());

        let idx = m.create_attachment("cape", AttachmentType::Bone, "spine").unwrap();
        let bone = m.get_mut(idx).unwrap().as_bone_mut().unwrap();
        bone.simulation.params.proxy_names = vec!["skull".into(), "missing".into(), "chest".into()];
        m.verify_proxy_links();

        let sim = m.get(idx).unwrap().as_bone().unwrap().simulation();
        assert_eq!(sim.proxy_indices(), &[1, 0]);
        assert_eq!(sim.params.proxy_names, vec!["skull".to_string(), "chest".to_string()]);

        // 删除 chest 后 skull 移到索引 0
        assert!(m.remove_proxy_by_name("chest"));
        let sim = m.get(idx).unwrap().as_bone().unwrap().simulation();
        assert_eq!(sim.proxy_indices(), &[0]);
    }

    #[test]
    fn test_proxy_follows_pose() {
        let mut m = manager();
        m.create_proxy("skull", "head").unwrap();
        let mut pose = PoseData::from_default(m.skeleton());
        pose.set_relative(0, QuatT::new(Quat::IDENTITY, Vec3::new(1.0, 0.0, 0.0)));
        pose.compute_absolute_pose(m.skeleton().parents());
        m.prepare_all_redirected_transformations(&pose, &FrameContext::default());
        let current = m.proxy(0).unwrap().model_relative();
        assert!((current.t - Vec3::new(1.0, 0.0, 1.5)).length() < 1.0e-5);
        // 上一帧变换在生成命令执行前保持不变
        assert!((m.proxy(0).unwrap().model_relative_prev().t - Vec3::new(0.0, 0.0, 1.5)).length() < 1.0e-5);
        m.generate_proxy_model_relative_transformations();
        assert_eq!(m.proxy(0).unwrap().model_relative_prev().t, current.t);
    }

    #[test]
    fn test_update_attached_objects_inherits_hide_flags() {
        let mut m = manager();
        m.create_attachment("hat", AttachmentType::Bone, "head").unwrap();
        m.add_binding("hat", AttachmentObject::StatObj { name: "hat.cgf".into(), radius: 0.0 })
            .unwrap();
        m.update_bindings();

        let pose = PoseData::from_default(m.skeleton());
        let config = AnimationConfig::default();
        let frame = FrameContext::default();
        let sim = SimulationContext {
            config: &config,
            frame: &frame,
            location: QuatTS::IDENTITY,
        };
        m.update_sockets(&pose, &sim);

        let updates = m.update_attached_objects(&QuatTS::IDENTITY, AttachmentFlags::HIDE_SHADOW_PASS);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_rendered_in(RenderPass::Main));
        assert!(!updates[0].is_rendered_in(RenderPass::Shadow));
        assert!((updates[0].world.t - Vec3::new(0.0, 0.0, 1.5)).length() < 1.0e-5);
    }
}
