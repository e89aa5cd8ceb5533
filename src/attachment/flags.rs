//! 挂点标志
//!
//! 位值与挂点定义文件中的 `Flags` 属性保持一致。

use bitflags::bitflags;

bitflags! {
    /// 挂点标志
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AttachmentFlags: u32 {
        /// 定义文件中请求隐藏（加载时展开为三个通道的隐藏标志）
        const HIDE_ATTACHMENT = 0x01;
        /// 参与物理射线检测
        const PHYSICALIZED_RAYS = 0x02;
        /// 参与物理碰撞
        const PHYSICALIZED_COLLISIONS = 0x04;
        /// 软件蒙皮
        const SW_SKINNING = 0x08;
        /// 距离剔除判定为可见
        const VISIBLE = 0x2000;
        /// 已根据绑定姿态计算出相对骨骼的偏移
        const PROJECTED = 0x4000;
        /// 主渲染通道隐藏
        const HIDE_MAIN_PASS = 0x10_0000;
        /// 阴影通道隐藏
        const HIDE_SHADOW_PASS = 0x20_0000;
        /// 递归（反射）通道隐藏
        const HIDE_RECURSION = 0x40_0000;
        /// 不参与近景渲染
        const EXCLUDE_FROM_NEAREST = 0x200_0000;

        const PHYSICALIZED = Self::PHYSICALIZED_RAYS.bits() | Self::PHYSICALIZED_COLLISIONS.bits();
        /// 三个渲染通道的隐藏标志
        const HIDE_ALL_PASSES = Self::HIDE_MAIN_PASS.bits()
            | Self::HIDE_SHADOW_PASS.bits()
            | Self::HIDE_RECURSION.bits();
    }
}

/// 渲染通道
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Main,
    Shadow,
    /// 反射等递归通道
    Recursion,
}

impl RenderPass {
    /// 该通道对应的隐藏标志
    #[inline]
    pub fn hide_flag(self) -> AttachmentFlags {
        match self {
            RenderPass::Main => AttachmentFlags::HIDE_MAIN_PASS,
            RenderPass::Shadow => AttachmentFlags::HIDE_SHADOW_PASS,
            RenderPass::Recursion => AttachmentFlags::HIDE_RECURSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_definition_bits() {
        let flags = AttachmentFlags::from_bits_truncate(0x01 | 0x10_0000 | 0x8000_0000);
        assert!(flags.contains(AttachmentFlags::HIDE_ATTACHMENT));
        assert!(flags.contains(AttachmentFlags::HIDE_MAIN_PASS));
        assert!(!flags.contains(AttachmentFlags::PROJECTED));
    }

    #[test]
    fn test_pass_hide_flag() {
        assert!(AttachmentFlags::HIDE_ALL_PASSES.contains(RenderPass::Shadow.hide_flag()));
        assert_eq!(RenderPass::Main.hide_flag(), AttachmentFlags::HIDE_MAIN_PASS);
    }
}
