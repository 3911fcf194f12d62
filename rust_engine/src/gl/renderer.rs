//! 网格渲染器
//!
//! 两种格式共用：按渲染顺序逐个提交可绘制对象。

use std::collections::HashMap;

use glam::Mat4;

use super::{ClippingManager, GlContext, GlTextureId, MeshDrawCall};
use crate::moc::CoreModel;
use crate::Result;

/// 低于此不透明度的可绘制对象跳过
const MIN_VISIBLE_OPACITY: f32 = 0.001;

pub struct MeshRenderer {
    textures: HashMap<usize, GlTextureId>,
    mvp: Mat4,
    premultiplied_alpha: bool,
    first_draw: bool,
    context_id: Option<u64>,
    clipping: ClippingManager,
}

impl MeshRenderer {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            mvp: Mat4::IDENTITY,
            premultiplied_alpha: false,
            first_draw: true,
            context_id: None,
            clipping: ClippingManager::new(),
        }
    }

    pub fn set_premultiplied_alpha(&mut self, premultiplied: bool) {
        self.premultiplied_alpha = premultiplied;
    }

    pub fn is_premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn bind_texture(&mut self, index: usize, texture: GlTextureId) {
        self.textures.insert(index, texture);
    }

    pub fn texture(&self, index: usize) -> Option<GlTextureId> {
        self.textures.get(&index).copied()
    }

    pub fn set_mvp(&mut self, mvp: Mat4) {
        self.mvp = mvp;
    }

    pub fn mvp(&self) -> Mat4 {
        self.mvp
    }

    pub fn is_first_draw(&self) -> bool {
        self.first_draw
    }

    pub fn context_id(&self) -> Option<u64> {
        self.context_id
    }

    pub fn clipping(&self) -> &ClippingManager {
        &self.clipping
    }

    pub fn clipping_mut(&mut self) -> &mut ClippingManager {
        &mut self.clipping
    }

    /// 上下文重建：丢弃旧上下文的纹理绑定与遮罩目标，保留模拟状态
    pub fn reset_context(&mut self, context_id: u64) {
        self.first_draw = true;
        self.textures.clear();
        self.context_id = Some(context_id);
        self.clipping.reset(context_id);
    }

    /// 提交整个模型，返回绘制调用数
    pub fn draw_model(
        &mut self,
        gl: &mut dyn GlContext,
        core: &CoreModel,
        viewport: [f32; 4],
        disable_culling: bool,
    ) -> Result<usize> {
        let mask = self.clipping.setup(gl, core, self.mvp, viewport)?;

        let mut count = 0;
        for index in core.sorted_drawable_indices() {
            let (Some(drawable), Some(vertices)) = (core.drawable(index), core.drawable_vertices(index)) else {
                continue;
            };
            let opacity = core.drawable_opacity(index);
            if opacity < MIN_VISIBLE_OPACITY {
                continue;
            }

            let culling = !disable_culling && !drawable.double_sided;
            gl.set_culling(culling);
            gl.draw_mesh(&MeshDrawCall {
                texture: self.texture(drawable.texture_index),
                vertices,
                uvs: &drawable.uvs,
                indices: &drawable.indices,
                opacity,
                blend: drawable.blend,
                mvp: self.mvp,
                premultiplied_alpha: self.premultiplied_alpha,
                culling,
                mask: if drawable.masks.is_empty() { None } else { mask },
                inverted_mask: drawable.inverted_mask,
                writing_mask: false,
            });
            count += 1;
        }

        self.first_draw = false;
        Ok(count)
    }
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self::new()
    }
}
