//! 挂点系统
//!
//! 挂点是骨架上带名称的绑定位置，可以挂静态物体、子角色、蒙皮网格或布料。
//! 骨骼/面挂点可以带次级运动模拟（摆锤、弹簧、代理体投影）。
//! 所有挂点由 `AttachmentManager` 持有，按处理区间批量更新。

mod attached_cache;
mod base;
mod bone;
mod definition;
mod face;
mod flags;
mod manager;
mod modification;
mod object;
mod processing_buffer;
mod proxy;
mod row;
mod serialize;
pub mod simulation;
mod skin;
mod variant;
mod vcloth;

pub use attached_cache::{AttachedChange, AttachedCharacterCache};
pub use base::{AttachmentBase, AttachmentType};
pub use bone::BoneAttachment;
pub use definition::{
    parse_attachment_list, AttachmentNode, BindingResolver, CharacterAttachmentDesc, MAX_MATERIAL_LODS,
};
pub use face::FaceAttachment;
pub use flags::{AttachmentFlags, RenderPass};
pub use manager::{AttachedObjectUpdate, AttachmentManager};
pub use modification::{ModificationCommand, ModificationCommandBuffer};
pub use object::{AttachmentObject, BindingKind, ObjectKind};
pub use processing_buffer::{ProcessingBuffer, ProcessingRange, BLEND_WEIGHT_JOINT_NAME};
pub use proxy::{Proxy, DEFAULT_PROXY_PARAMS};
pub use row::{PendulumRowAttachment, RowClampMode, RowParticle, RowSimulationParams, MAX_JOINTS_PER_ROW};
pub use serialize::{AttachmentSnapshot, AttachmentState};
pub use simulation::{ClampType, ProjectionType, Simulation, SimulationContext, SimulationParams};
pub use skin::{SkinAttachment, SkinBinding};
pub use variant::Attachment;
pub use vcloth::{VClothAttachment, VClothParams};
