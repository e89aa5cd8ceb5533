//! 挂点列表定义
//!
//! XML 读取由外部完成，这里接收已经解析成节点树的 `<AttachmentList>`，
//! 按属性前缀（`PA_` 摆锤、`SA_` 弹簧、`P_` 投影、`ROW_` 骨骼链）填充挂点描述，
//! 再由 `AttachmentManager::init_attachment_list` 创建挂点、绑定对象与代理体。
//!
//! 属性值格式错误属于资源错误：记录警告后保持默认值，不中断加载。

use glam::{Quat, Vec2, Vec3, Vec4};

use crate::error::{AnimError, Result};
use crate::math::QuatT;

use super::base::AttachmentType;
use super::flags::AttachmentFlags;
use super::manager::AttachmentManager;
use super::object::{AttachmentObject, BindingKind};
use super::proxy::{Proxy, DEFAULT_PROXY_PARAMS};
use super::row::{RowClampMode, RowSimulationParams};
use super::simulation::{ClampType, ProjectionType, Simulation, SimulationParams, MAX_SIMULATION_PROXIES};
use super::variant::Attachment;
use super::vcloth::VClothParams;

/// LOD 材质数
pub const MAX_MATERIAL_LODS: usize = 6;

// ============================================================================
// 节点
// ============================================================================

/// 定义文件中的一个元素
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttachmentNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<AttachmentNode>,
}

impl AttachmentNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// 追加属性（构建用）
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: AttachmentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 读取属性，成功时写入 `out` 并返回 true
    fn read<T: AttrValue>(&self, name: &str, out: &mut T) -> bool {
        let Some(raw) = self.attr(name) else {
            return false;
        };
        match T::parse_attr(raw) {
            Some(value) => {
                *out = value;
                true
            }
            None => {
                let err = AnimError::InvalidAttribute {
                    name: name.to_string(),
                    value: raw.to_string(),
                };
                log::warn!("[Attachment] {}", err);
                false
            }
        }
    }

    fn string(&self, name: &str) -> String {
        self.attr(name).unwrap_or_default().to_string()
    }
}

// ============================================================================
// 属性值
// ============================================================================

trait AttrValue: Sized {
    fn parse_attr(raw: &str) -> Option<Self>;
}

fn parse_floats<const N: usize>(raw: &str) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    let mut parts = raw.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

impl AttrValue for f32 {
    fn parse_attr(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

impl AttrValue for u32 {
    fn parse_attr(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

impl AttrValue for u8 {
    fn parse_attr(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

impl AttrValue for bool {
    fn parse_attr(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        }
    }
}

impl AttrValue for Vec2 {
    fn parse_attr(raw: &str) -> Option<Self> {
        parse_floats::<2>(raw).map(Vec2::from_array)
    }
}

impl AttrValue for Vec3 {
    fn parse_attr(raw: &str) -> Option<Self> {
        parse_floats::<3>(raw).map(Vec3::from_array)
    }
}

impl AttrValue for Vec4 {
    fn parse_attr(raw: &str) -> Option<Self> {
        parse_floats::<4>(raw).map(Vec4::from_array)
    }
}

/// 四元数按 `w,x,y,z` 顺序书写
impl AttrValue for Quat {
    fn parse_attr(raw: &str) -> Option<Self> {
        let [w, x, y, z] = parse_floats::<4>(raw)?;
        let q = Vec4::new(x, y, z, w).try_normalize()?;
        Some(Quat::from_vec4(q))
    }
}

// ============================================================================
// 挂点描述
// ============================================================================

/// 一条挂点定义
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterAttachmentDesc {
    pub ty: AttachmentType,
    pub name: String,
    pub joint_name: String,
    /// 绑定对象路径（扩展名决定对象种类）
    pub binding_path: String,
    /// 布料模拟网格路径
    pub sim_binding_path: String,
    pub absolute_default: QuatT,
    pub relative_default: QuatT,
    /// `RelRotation` 存在时覆盖相对旋转
    pub rel_rotation: bool,
    /// `RelPosition` 存在时覆盖相对位置
    pub rel_position: bool,
    pub flags: AttachmentFlags,
    pub proxy_params: Vec4,
    pub proxy_purpose: u8,
    pub material: Option<String>,
    pub material_lods: [Option<String>; MAX_MATERIAL_LODS],
    pub simulation: SimulationParams,
    pub row_joint_name: String,
    pub row_params: RowSimulationParams,
    pub cloth_params: VClothParams,
}

impl CharacterAttachmentDesc {
    pub fn new(ty: AttachmentType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            joint_name: String::new(),
            binding_path: String::new(),
            sim_binding_path: String::new(),
            absolute_default: QuatT::IDENTITY,
            relative_default: QuatT::IDENTITY,
            rel_rotation: false,
            rel_position: false,
            flags: AttachmentFlags::empty(),
            proxy_params: DEFAULT_PROXY_PARAMS,
            proxy_purpose: 0,
            material: None,
            material_lods: Default::default(),
            simulation: SimulationParams::default(),
            row_joint_name: String::new(),
            row_params: RowSimulationParams::default(),
            cloth_params: VClothParams::default(),
        }
    }

    #[inline]
    pub fn binding_kind(&self) -> BindingKind {
        BindingKind::from_path(&self.binding_path)
    }
}

/// 把绑定路径解析成对象（加载资源由调用方负责）
pub trait BindingResolver {
    /// 解析 `binding_path`，失败返回 None
    fn resolve(&mut self, desc: &CharacterAttachmentDesc) -> Option<AttachmentObject>;

    /// 解析布料模拟网格 `sim_binding_path`
    fn resolve_sim_mesh(&mut self, _desc: &CharacterAttachmentDesc) -> Option<AttachmentObject> {
        None
    }
}

fn unify_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 读取 `<prefix>Proxy00` 起的代理名
fn read_proxy_names(node: &AttachmentNode, prefix: &str, out: &mut Vec<String>) {
    for i in 0..MAX_SIMULATION_PROXIES {
        let name = node.string(&format!("{prefix}Proxy{i:02}"));
        if !name.is_empty() {
            out.push(name);
        }
    }
}

/// 与挂点骨骼同名的方向参考骨骼没有意义
fn clear_self_reference(dir_trans_joint: &mut String, joint_name: &str) {
    if !dir_trans_joint.is_empty() && dir_trans_joint.eq_ignore_ascii_case(joint_name) {
        dir_trans_joint.clear();
    }
}

/// 解析 `<AttachmentList>`
///
/// 标签不是 `Attachment` 或 `Type` 未知的子节点被跳过。
pub fn parse_attachment_list(root: &AttachmentNode) -> Result<Vec<CharacterAttachmentDesc>> {
    if root.tag != "AttachmentList" {
        return Err(AnimError::InvalidAttribute {
            name: "tag".to_string(),
            value: root.tag.clone(),
        });
    }
    let descs: Vec<CharacterAttachmentDesc> = root.children.iter().filter_map(parse_attachment).collect();
    log::debug!(
        "[Attachment] 挂点列表解析完成: {}/{} 个有效",
        descs.len(),
        root.children.len()
    );
    Ok(descs)
}

fn parse_attachment(node: &AttachmentNode) -> Option<CharacterAttachmentDesc> {
    if node.tag != "Attachment" {
        return None;
    }
    let type_name = node.attr("Type").unwrap_or_default();
    let Some(ty) = AttachmentType::from_type_name(type_name) else {
        log::debug!("[Attachment] 跳过未知挂点类型 '{}'", type_name);
        return None;
    };

    let mut desc = CharacterAttachmentDesc::new(ty, unify_path(&node.string("AName")));
    node.read("Rotation", &mut desc.absolute_default.q);
    node.read("Position", &mut desc.absolute_default.t);
    desc.rel_rotation = node.read("RelRotation", &mut desc.relative_default.q);
    desc.rel_position = node.read("RelPosition", &mut desc.relative_default.t);

    desc.joint_name = node.string("BoneName");
    desc.binding_path = unify_path(&node.string("Binding"));
    desc.sim_binding_path = node.string("simBinding");

    node.read("ProxyParams", &mut desc.proxy_params);
    node.read("ProxyPurpose", &mut desc.proxy_purpose);

    desc.material = node.attr("Material").map(str::to_string);
    for (lod, slot) in desc.material_lods.iter_mut().enumerate() {
        *slot = node.attr(&format!("MaterialLOD{lod}")).map(str::to_string);
    }

    parse_pendulum(node, &mut desc);
    parse_spring(node, &mut desc);
    parse_projection(node, &mut desc);
    desc.simulation.proc_function = node.string("ProcFunction");

    let mut flags = 0u32;
    if node.read("Flags", &mut flags) {
        desc.flags = AttachmentFlags::from_bits_truncate(flags);
    }

    match ty {
        AttachmentType::VCloth => parse_cloth(node, &mut desc),
        AttachmentType::PendulumRow => parse_row(node, &mut desc),
        _ => {}
    }
    Some(desc)
}

fn parse_pendulum(node: &AttachmentNode, desc: &mut CharacterAttachmentDesc) {
    let mut pendulum_type = 0u32;
    node.read("PA_PendulumType", &mut pendulum_type);
    let Some(clamp) = ClampType::from_pendulum_type(pendulum_type) else {
        return;
    };
    let ap = &mut desc.simulation;
    ap.clamp_type = clamp;
    node.read("PA_FPS", &mut ap.sim_fps);
    node.read("PA_Redirect", &mut ap.use_redirect);
    node.read("PA_MaxAngle", &mut ap.max_angle);
    node.read("PA_HRotation", &mut ap.disk_rotation.x);

    node.read("PA_Mass", &mut ap.mass);
    node.read("PA_Gravity", &mut ap.gravity);
    node.read("PA_Damping", &mut ap.damping);
    node.read("PA_Stiffness", &mut ap.stiffness);

    node.read("PA_PivotOffset", &mut ap.pivot_offset);
    // 旧名称，新名称优先
    node.read("PA_PendulumOffset", &mut ap.simulation_axis);
    node.read("PA_SimulationAxis", &mut ap.simulation_axis);
    node.read("PA_StiffnessTarget", &mut ap.stiffness_target);

    node.read("PA_CapsuleX", &mut ap.capsule.x);
    node.read("PA_CapsuleY", &mut ap.capsule.y);
    let mut projection = 0u32;
    if node.read("PA_ProjectionType", &mut projection) {
        ap.projection_type = ProjectionType::from_u32(projection);
    }
    ap.dir_trans_joint = node.string("PA_DirTransJointName");
    clear_self_reference(&mut ap.dir_trans_joint, &desc.joint_name);
    read_proxy_names(node, "PA_", &mut ap.proxy_names);
}

fn parse_spring(node: &AttachmentNode, desc: &mut CharacterAttachmentDesc) {
    let mut spring_type = 0u32;
    node.read("SA_SpringType", &mut spring_type);
    if spring_type == 0 {
        return;
    }
    let ap = &mut desc.simulation;
    ap.clamp_type = ClampType::SpringEllipsoid;
    node.read("SA_FPS", &mut ap.sim_fps);
    node.read("SA_Radius", &mut ap.radius);
    node.read("SA_ScaleZP", &mut ap.sphere_scale.x);
    node.read("SA_ScaleZN", &mut ap.sphere_scale.y);
    node.read("SA_DiskRotX", &mut ap.disk_rotation.x);
    node.read("SA_DiskRotZ", &mut ap.disk_rotation.y);
    node.read("SA_HRotation", &mut ap.disk_rotation.x);

    node.read("SA_Redirect", &mut ap.use_redirect);

    node.read("SA_Mass", &mut ap.mass);
    node.read("SA_Gravity", &mut ap.gravity);
    node.read("SA_Damping", &mut ap.damping);
    node.read("SA_Stiffness", &mut ap.stiffness);

    node.read("SA_PivotOffset", &mut ap.pivot_offset);
    node.read("SA_StiffnessTarget", &mut ap.stiffness_target);

    ap.capsule.x = 0.0;
    node.read("SA_CapsuleY", &mut ap.capsule.y);
    let mut projection = 0u32;
    if node.read("SA_ProjectionType", &mut projection) {
        ap.projection_type = ProjectionType::from_u32(projection);
    }
    read_proxy_names(node, "SA_", &mut ap.proxy_names);
}

fn parse_projection(node: &AttachmentNode, desc: &mut CharacterAttachmentDesc) {
    let mut is_projection = 0u32;
    node.read("P_Projection", &mut is_projection);
    if is_projection == 0 {
        return;
    }
    let ap = &mut desc.simulation;
    ap.clamp_type = ClampType::TranslationalProjection;
    ap.use_redirect = true;
    let mut projection = 0u32;
    if node.read("P_ProjectionType", &mut projection) {
        ap.projection_type = ProjectionType::from_u32(projection);
    }
    ap.dir_trans_joint = node.string("P_DirTransJointName");
    clear_self_reference(&mut ap.dir_trans_joint, &desc.joint_name);

    node.read("P_TranslationAxis", &mut ap.simulation_axis);
    node.read("P_CapsuleX", &mut ap.capsule.x);
    node.read("P_CapsuleY", &mut ap.capsule.y);
    node.read("P_PivotOffset", &mut ap.pivot_offset);
    read_proxy_names(node, "P_", &mut ap.proxy_names);
}

fn parse_cloth(node: &AttachmentNode, desc: &mut CharacterAttachmentDesc) {
    let cp = &mut desc.cloth_params;
    node.read("hide", &mut cp.hide);
    node.read("forceSkinning", &mut cp.force_skinning);
    node.read("forceSkinningFpsThreshold", &mut cp.force_skinning_fps_threshold);
    node.read("disableSimulationAtDistance", &mut cp.disable_simulation_at_distance);

    node.read("timeStep", &mut cp.time_step);
    node.read("timeStepMax", &mut cp.time_steps_max);
    node.read("numIterations", &mut cp.num_iterations);
    node.read("gravityFactor", &mut cp.gravity_factor);

    node.read("stretchStiffness", &mut cp.stretch_stiffness);
    node.read("shearStiffness", &mut cp.shear_stiffness);
    node.read("bendStiffness", &mut cp.bend_stiffness);
    node.read("pullStiffness", &mut cp.pull_stiffness);

    node.read("Friction", &mut cp.friction);
    node.read("rigidDamping", &mut cp.rigid_damping);
    node.read("springDamping", &mut cp.spring_damping);

    node.read("translationBlend", &mut cp.translation_blend);
    node.read("rotationBlend", &mut cp.rotation_blend);
    node.read("maxAnimDistance", &mut cp.max_anim_distance);

    cp.render_binding = desc.binding_path.clone();
    cp.sim_binding = desc.sim_binding_path.clone();
    cp.material = node.string("Material");
}

fn parse_row(node: &AttachmentNode, desc: &mut CharacterAttachmentDesc) {
    desc.row_joint_name = node.string("RowJointName");
    let mut clamp_mode = 0u32;
    if !node.read("ROW_ClampMode", &mut clamp_mode) {
        return;
    }
    let rp = &mut desc.row_params;
    rp.clamp_mode = RowClampMode::from_u32(clamp_mode);
    node.read("ROW_FPS", &mut rp.sim_fps);
    node.read("ROW_ConeAngle", &mut rp.cone_angle);
    node.read("ROW_ConeRotation", &mut rp.cone_rotation);

    node.read("ROW_Mass", &mut rp.mass);
    node.read("ROW_Gravity", &mut rp.gravity);
    node.read("ROW_Damping", &mut rp.damping);
    node.read("ROW_JointSpring", &mut rp.joint_spring);
    node.read("ROW_RodLength", &mut rp.rod_length);
    node.read("ROW_StiffnessTarget", &mut rp.stiffness_target);
    node.read("ROW_Turbulence", &mut rp.turbulence);
    node.read("ROW_MaxVelocity", &mut rp.max_velocity);

    node.read("ROW_Cycle", &mut rp.cycle);
    node.read("ROW_RelaxLoops", &mut rp.relax_loops);
    node.read("ROW_Stretch", &mut rp.stretch);

    node.read("ROW_CapsuleX", &mut rp.capsule.x);
    node.read("ROW_CapsuleY", &mut rp.capsule.y);
    let mut projection = 0u32;
    if node.read("ROW_ProjectionType", &mut projection) {
        rp.projection_type = ProjectionType::from_u32(projection);
    }
    read_proxy_names(node, "ROW_", &mut rp.proxy_names);
}

// ============================================================================
// 初始化
// ============================================================================

impl AttachmentManager {
    /// 按定义创建挂点、绑定对象与代理体，返回成功创建的挂点与代理体数
    pub fn init_attachment_list(
        &mut self,
        descs: &[CharacterAttachmentDesc],
        resolver: &mut dyn BindingResolver,
        log_warnings: bool,
    ) -> usize {
        // 先执行已记录的修改，下面的绑定是立即执行的
        self.update_bindings();

        let mut created = 0;
        for desc in descs {
            let ok = match desc.ty {
                AttachmentType::Bone => self.init_bone(desc, resolver, log_warnings),
                AttachmentType::Face => self.init_face(desc, resolver, log_warnings),
                AttachmentType::Skin => self.init_skin(desc, resolver, log_warnings),
                AttachmentType::Proxy => self.init_proxy(desc),
                AttachmentType::PendulumRow => self.init_row(desc),
                AttachmentType::VCloth => self.init_cloth(desc, resolver, log_warnings),
            };
            if ok {
                created += 1;
            }
        }

        self.project_all_attachments();
        self.verify_proxy_links();
        log::info!(
            "[Attachment] 挂点列表初始化: {} 个挂点, {} 个代理体",
            self.count(),
            self.proxy_count()
        );
        created
    }

    /// 绑定姿态下的骨骼变换叠加相对覆盖
    fn default_with_overrides(&self, desc: &CharacterAttachmentDesc, joint: i32) -> QuatT {
        if joint < 0 {
            return desc.absolute_default;
        }
        let joint_default = self.skeleton().default_absolute(joint as usize);
        let mut rel = joint_default.inverse() * desc.absolute_default;
        if desc.rel_position {
            rel.t = desc.relative_default.t;
        }
        if desc.rel_rotation {
            rel.q = desc.relative_default.q;
        }
        joint_default * rel
    }

    /// 解析并立即绑定对象；只接受 `accepted` 中的文件种类
    fn bind_resolved(
        &mut self,
        index: usize,
        desc: &CharacterAttachmentDesc,
        resolver: &mut dyn BindingResolver,
        accepted: &[BindingKind],
        log_warnings: bool,
    ) -> bool {
        if !accepted.contains(&desc.binding_kind()) {
            return false;
        }
        let Some(object) = resolver.resolve(desc) else {
            if log_warnings && !desc.binding_path.is_empty() {
                log::error!(
                    "[Attachment] 挂点 '{}' 的绑定对象创建失败: {}",
                    desc.name,
                    desc.binding_path
                );
            }
            return false;
        };
        self.bind_immediate(index, object)
    }

    fn init_bone(&mut self, desc: &CharacterAttachmentDesc, resolver: &mut dyn BindingResolver, log_warnings: bool) -> bool {
        let Ok(index) = self.create_attachment(&desc.name, AttachmentType::Bone, &desc.joint_name) else {
            return false;
        };
        let joint = self.skeleton().joint_id_by_name(&desc.joint_name);
        let absolute = self.default_with_overrides(desc, joint);
        let skeleton = self.skeleton().clone();
        if let Some(Attachment::Bone(bone)) = self.attachments_mut().get_mut(index) {
            bone.set_absolute_default(absolute);
            bone.project_attachment(&skeleton);
            bone.simulation = Simulation::new(desc.simulation.clone());
        }
        self.apply_definition_flags(index, desc.flags);
        self.bind_resolved(
            index,
            desc,
            resolver,
            &[BindingKind::Character, BindingKind::StaticGeometry],
            log_warnings,
        );
        true
    }

    fn init_face(&mut self, desc: &CharacterAttachmentDesc, resolver: &mut dyn BindingResolver, log_warnings: bool) -> bool {
        let Ok(index) = self.create_attachment(&desc.name, AttachmentType::Face, "") else {
            return false;
        };
        if let Some(Attachment::Face(face)) = self.attachments_mut().get_mut(index) {
            face.set_absolute_default(desc.absolute_default);
            face.simulation = Simulation::new(desc.simulation.clone());
        }
        self.apply_definition_flags(index, desc.flags);
        self.bind_resolved(
            index,
            desc,
            resolver,
            &[BindingKind::Character, BindingKind::StaticGeometry],
            log_warnings,
        );
        true
    }

    fn init_skin(&mut self, desc: &CharacterAttachmentDesc, resolver: &mut dyn BindingResolver, log_warnings: bool) -> bool {
        let Ok(index) = self.create_attachment(&desc.name, AttachmentType::Skin, "") else {
            return false;
        };
        if desc.binding_kind() != BindingKind::Skin && !desc.binding_path.is_empty() {
            log::error!(
                "[Attachment] 蒙皮挂点 '{}' 的绑定必须是 .skin 文件: {}",
                desc.name,
                desc.binding_path
            );
        }
        if self.bind_resolved(index, desc, resolver, &[BindingKind::Skin], log_warnings) {
            self.apply_definition_flags(index, desc.flags);
        }
        true
    }

    fn init_proxy(&mut self, desc: &CharacterAttachmentDesc) -> bool {
        let joint = self.skeleton().joint_id_by_name(&desc.joint_name);
        let absolute = self.default_with_overrides(desc, joint);
        let proxy = Proxy::new(
            &desc.name,
            &desc.joint_name,
            absolute,
            desc.proxy_params,
            desc.proxy_purpose,
        );
        self.push_proxy(proxy).is_ok()
    }

    fn init_row(&mut self, desc: &CharacterAttachmentDesc) -> bool {
        let Ok(index) = self.create_attachment(&desc.name, AttachmentType::PendulumRow, &desc.row_joint_name) else {
            return false;
        };
        if let Some(Attachment::PendulumRow(row)) = self.attachments_mut().get_mut(index) {
            row.params = desc.row_params.clone();
        }
        true
    }

    fn init_cloth(&mut self, desc: &CharacterAttachmentDesc, resolver: &mut dyn BindingResolver, log_warnings: bool) -> bool {
        let Ok(index) = self.create_attachment(&desc.name, AttachmentType::VCloth, "") else {
            return false;
        };
        let render_ok = desc.binding_kind() == BindingKind::Skin;
        let sim_ok = BindingKind::from_path(&desc.sim_binding_path) == BindingKind::Skin;
        if !render_ok {
            log::error!("[Attachment] 布料 '{}' 的渲染网格必须是 .skin 文件", desc.name);
        }
        if !sim_ok {
            log::error!("[Attachment] 布料 '{}' 的模拟网格必须是 .skin 文件", desc.name);
        }
        if !(render_ok && sim_ok) {
            return true;
        }

        let sim_mesh = resolver.resolve_sim_mesh(desc);
        if sim_mesh.is_none() && log_warnings {
            log::error!(
                "[Attachment] 布料 '{}' 的模拟网格创建失败: {}",
                desc.name,
                desc.sim_binding_path
            );
        }
        if !self.bind_resolved(index, desc, resolver, &[BindingKind::Skin], log_warnings) {
            return true;
        }
        self.apply_definition_flags(index, desc.flags | AttachmentFlags::SW_SKINNING);
        let skeleton = self.skeleton().clone();
        if let Some(Attachment::VCloth(cloth)) = self.attachments_mut().get_mut(index) {
            if let Some(sim_mesh) = &sim_mesh {
                cloth.add_sim_binding(sim_mesh, &skeleton);
            }
            cloth.params = desc.cloth_params.clone();
        }
        true
    }

    fn apply_definition_flags(&mut self, index: usize, flags: AttachmentFlags) {
        if let Some(attachment) = self.attachments_mut().get_mut(index) {
            attachment.set_flags(flags);
            attachment.hide_attachment(flags.contains(AttachmentFlags::HIDE_ATTACHMENT));
        }
    }
}
