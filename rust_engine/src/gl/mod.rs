//! GPU 上下文抽象
//!
//! 宿主注入 `Renderer`，模型只通过 `GlContext` 提交网格，
//! 不依赖任何全局上下文。

mod clipping;
mod renderer;

pub use clipping::ClippingManager;
pub use renderer::MeshRenderer;

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Affine2, Mat4};

use crate::moc::BlendMode;
use crate::texture::Texture;
use crate::Result;

/// GPU 纹理句柄
pub type GlTextureId = u32;

/// 帧缓冲句柄
pub type GlFramebufferId = u32;

/// 单次网格提交
#[derive(Debug, Clone)]
pub struct MeshDrawCall<'a> {
    pub texture: Option<GlTextureId>,
    /// 模型单位的平铺 xy
    pub vertices: &'a [f32],
    pub uvs: &'a [f32],
    pub indices: &'a [u16],
    pub opacity: f32,
    pub blend: BlendMode,
    pub mvp: Mat4,
    pub premultiplied_alpha: bool,
    pub culling: bool,
    /// 遮罩纹理（已绘制好的遮罩目标）
    pub mask: Option<GlTextureId>,
    pub inverted_mask: bool,
    /// 当前提交是否在写遮罩
    pub writing_mask: bool,
}

/// 最小 GL 接口
pub trait GlContext {
    /// UNPACK_FLIP_Y
    fn pixel_store_flip_y(&mut self, flip: bool);

    /// 上传纹理，返回当前上下文中的句柄
    fn upload_texture(&mut self, texture: &Texture) -> Result<GlTextureId>;

    fn delete_texture(&mut self, texture: GlTextureId);

    /// 设置视口 `[x, y, w, h]`
    fn viewport(&mut self, rect: [f32; 4]);

    /// 当前绑定的帧缓冲，`None` 表示默认帧缓冲
    fn framebuffer_binding(&self) -> Option<GlFramebufferId>;

    fn bind_framebuffer(&mut self, framebuffer: Option<GlFramebufferId>);

    /// 创建离屏目标，返回 (帧缓冲, 颜色纹理)
    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<(GlFramebufferId, GlTextureId)>;

    fn set_culling(&mut self, enabled: bool);

    fn draw_mesh(&mut self, call: &MeshDrawCall<'_>);
}

/// 宿主渲染器
pub trait Renderer {
    /// 上下文唯一标识，上下文重建后改变
    fn context_uid(&self) -> u64;

    fn gl(&mut self) -> &mut dyn GlContext;

    /// 屏幕尺寸，未知时用 800x600
    fn screen_size(&self) -> Option<(f32, f32)>;

    /// 宿主投影矩阵，缺省时按屏幕尺寸构造
    fn projection(&self) -> Option<Affine2>;

    /// 纹理 GC 计数
    fn texture_gc_count(&self) -> u64;
}

pub type SharedRenderer = Rc<RefCell<dyn Renderer>>;

/// 屏幕像素 → 裁剪空间（y 向下）
pub fn screen_projection(width: f32, height: f32) -> Affine2 {
    Affine2::from_cols_array(&[2.0 / width, 0.0, 0.0, -2.0 / height, -1.0, 1.0])
}

/// 2D 仿射 → 4x4 列主序矩阵
///
/// `invert_y` 时取反第二列（模型 y 轴向上）。
pub fn affine_to_mvp(matrix: &Affine2, invert_y: bool) -> Mat4 {
    let sign = if invert_y { -1.0 } else { 1.0 };
    let [a, b] = matrix.matrix2.x_axis.to_array();
    let [c, d] = matrix.matrix2.y_axis.to_array();
    let [tx, ty] = matrix.translation.to_array();

    let mut array = Mat4::IDENTITY.to_cols_array();
    array[0] = a;
    array[1] = b;
    array[4] = c * sign;
    array[5] = d * sign;
    array[12] = tx;
    array[13] = ty;
    Mat4::from_cols_array(&array)
}
