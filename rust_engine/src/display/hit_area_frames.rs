//! 点击区域调试框
//!
//! 每个点击区域一个矩形和一个名称标签，指针移动时命中的区域高亮。
//! 矩形在模型的局部空间（内部模型的局部变换之后），线宽和标签按世界缩放反向补偿。

use std::collections::HashSet;

use super::Live2DModel;

pub const HIT_AREA_NORMAL_COLOR: u32 = 0xe31a1a;
pub const HIT_AREA_ACTIVE_COLOR: u32 = 0x1ec832;

const DEFAULT_STROKE_WIDTH: f32 = 4.0;

/// 单个点击区域的绘制数据
#[derive(Debug, Clone, PartialEq)]
pub struct HitAreaFrame {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: u32,
    pub stroke_width: f32,
    pub label_x: f32,
    pub label_y: f32,
    pub label_scale: f32,
    pub label_visible: bool,
}

#[derive(Debug, Clone)]
pub struct HitAreaFrames {
    pub stroke_width: f32,
    pub normal_color: u32,
    pub active_color: u32,
    /// 当前显示标签的区域
    visible: HashSet<String>,
}

impl Default for HitAreaFrames {
    fn default() -> Self {
        Self {
            stroke_width: DEFAULT_STROKE_WIDTH,
            normal_color: HIT_AREA_NORMAL_COLOR,
            active_color: HIT_AREA_ACTIVE_COLOR,
            visible: HashSet::new(),
        }
    }
}

impl HitAreaFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// 世界坐标；只显示命中区域的标签
    pub fn on_pointer_move(&mut self, model: &Live2DModel, x: f32, y: f32) {
        self.visible = model.hit_test(x, y).into_iter().collect();
    }

    pub fn is_label_visible(&self, name: &str) -> bool {
        self.visible.contains(name)
    }

    pub fn frames(&self, model: &Live2DModel) -> Vec<HitAreaFrame> {
        let Some(internal) = model.internal_model() else {
            return Vec::new();
        };
        let world = model.world_transform().matrix2;
        let scale = 1.0 / (world.x_axis.x * world.x_axis.x + world.x_axis.y * world.x_axis.y).sqrt();
        let scale = if scale.is_finite() { scale } else { 1.0 };

        let local = internal.local_transform();
        let (a, d) = (local.matrix2.x_axis.x, local.matrix2.y_axis.y);
        let (tx, ty) = (local.translation.x, local.translation.y);

        internal
            .hit_area_defs()
            .iter()
            .filter_map(|area| {
                let bounds = internal.drawable_bounds(area.drawable?)?;
                let x = bounds.x * a + tx;
                let y = bounds.y * d + ty;
                let stroke_width = self.stroke_width * scale;
                let label_visible = self.is_label_visible(&area.name);
                Some(HitAreaFrame {
                    name: area.name.clone(),
                    x,
                    y,
                    width: bounds.width * a,
                    height: bounds.height * d,
                    color: if label_visible {
                        self.active_color
                    } else {
                        self.normal_color
                    },
                    stroke_width,
                    label_x: x + stroke_width * scale,
                    label_y: y + stroke_width * scale,
                    label_scale: scale,
                    label_visible,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::display::Live2DModelOptions;
    use crate::factory::{Live2DFactory, MemoryAssetSource};
    use crate::testing::{cubism4_moc_json, cubism4_settings_json, png_bytes};

    fn model() -> Live2DModel {
        let source = MemoryAssetSource::new()
            .with("haru/haru.model3.json", cubism4_settings_json())
            .with("haru/model.moc.json", cubism4_moc_json())
            .with("haru/textures/texture_00.png", png_bytes(2, 2, [255, 255, 255, 255]));
        Live2DModel::load(&Live2DFactory::new(source), "haru/haru.model3.json", Live2DModelOptions::default())
            .unwrap()
    }

    #[test]
    fn test_frames_follow_drawable_bounds() {
        let model = model();
        let frames = HitAreaFrames::new().frames(&model);
        assert_eq!(frames.len(), 1);

        let frame = &frames[0];
        let internal = model.internal_model().unwrap();
        let bounds = internal
            .drawable_bounds(internal.core().drawable_index("HitAreaBody").unwrap())
            .unwrap();
        let top_left = internal.local_transform().transform_point2(Vec2::new(bounds.x, bounds.y));
        assert_eq!(frame.name, "Body");
        assert!((frame.x - top_left.x).abs() < 1e-3);
        assert!((frame.y - top_left.y).abs() < 1e-3);
        assert_eq!(frame.color, HIT_AREA_NORMAL_COLOR);
        assert_eq!(frame.stroke_width, 4.0);
        assert!(!frame.label_visible);
    }

    #[test]
    fn test_pointer_move_highlights() {
        let model = model();
        let mut overlay = HitAreaFrames::new();
        let frame = overlay.frames(&model).remove(0);
        let center = model
            .world_transform()
            .transform_point2(Vec2::new(frame.x + frame.width / 2.0, frame.y + frame.height / 2.0));

        overlay.on_pointer_move(&model, center.x, center.y);
        assert!(overlay.is_label_visible("Body"));
        assert_eq!(overlay.frames(&model)[0].color, HIT_AREA_ACTIVE_COLOR);

        overlay.on_pointer_move(&model, -10_000.0, -10_000.0);
        assert!(!overlay.is_label_visible("Body"));
    }

    #[test]
    fn test_stroke_compensates_world_scale() {
        let mut model = model();
        model.set_scale(2.0, 2.0);
        let frame = HitAreaFrames::new().frames(&model).remove(0);
        assert!((frame.label_scale - 0.5).abs() < 1e-6);
        assert!((frame.stroke_width - 2.0).abs() < 1e-6);
    }
}
