//! 遮罩管理
//!
//! 被遮罩的可绘制对象先把遮罩网格画进离屏目标，再用该纹理裁剪。

use std::collections::BTreeSet;

use glam::Mat4;

use super::{GlContext, GlFramebufferId, GlTextureId, MeshDrawCall};
use crate::moc::CoreModel;
use crate::Result;

/// 默认遮罩目标尺寸
const DEFAULT_MASK_SIZE: u32 = 256;

pub struct ClippingManager {
    /// 当前帧号，上下文重建时重置为上下文 id
    frame_no: u64,
    mask_size: u32,
    mask_target: Option<(GlFramebufferId, GlTextureId)>,
    /// 写完遮罩后是否恢复视口
    restore_viewport: bool,
}

impl ClippingManager {
    pub fn new() -> Self {
        Self {
            frame_no: 0,
            mask_size: DEFAULT_MASK_SIZE,
            mask_target: None,
            restore_viewport: false,
        }
    }

    pub fn frame_no(&self) -> u64 {
        self.frame_no
    }

    pub fn set_restore_viewport(&mut self, restore: bool) {
        self.restore_viewport = restore;
    }

    pub fn restores_viewport(&self) -> bool {
        self.restore_viewport
    }

    pub fn mask_texture(&self) -> Option<GlTextureId> {
        self.mask_target.map(|(_, texture)| texture)
    }

    /// 丢弃旧上下文的遮罩目标
    pub fn reset(&mut self, frame_no: u64) {
        self.frame_no = frame_no;
        self.mask_target = None;
    }

    /// 按需创建遮罩目标
    pub fn ensure_mask_target(&mut self, gl: &mut dyn GlContext) -> Result<(GlFramebufferId, GlTextureId)> {
        if let Some(target) = self.mask_target {
            return Ok(target);
        }
        let target = gl.create_framebuffer(self.mask_size, self.mask_size)?;
        self.mask_target = Some(target);
        Ok(target)
    }

    /// 绘制本帧所需的全部遮罩，返回遮罩纹理；模型没有遮罩时返回 None
    pub fn setup(
        &mut self,
        gl: &mut dyn GlContext,
        core: &CoreModel,
        mvp: Mat4,
        viewport: [f32; 4],
    ) -> Result<Option<GlTextureId>> {
        let masks: BTreeSet<usize> = (0..core.drawable_count())
            .filter_map(|i| core.drawable(i))
            .flat_map(|d| d.masks.iter().copied())
            .collect();
        if masks.is_empty() {
            return Ok(None);
        }

        let saved = gl.framebuffer_binding();
        let (framebuffer, texture) = self.ensure_mask_target(gl)?;
        gl.bind_framebuffer(Some(framebuffer));
        gl.viewport([0.0, 0.0, self.mask_size as f32, self.mask_size as f32]);

        for index in masks {
            let (Some(drawable), Some(vertices)) = (core.drawable(index), core.drawable_vertices(index)) else {
                continue;
            };
            gl.draw_mesh(&MeshDrawCall {
                texture: None,
                vertices,
                uvs: &drawable.uvs,
                indices: &drawable.indices,
                opacity: 1.0,
                blend: drawable.blend,
                mvp,
                premultiplied_alpha: false,
                culling: false,
                mask: None,
                inverted_mask: false,
                writing_mask: true,
            });
        }

        gl.bind_framebuffer(saved);
        if self.restore_viewport {
            gl.viewport(viewport);
        }
        self.frame_no += 1;
        Ok(Some(texture))
    }
}

impl Default for ClippingManager {
    fn default() -> Self {
        Self::new()
    }
}
