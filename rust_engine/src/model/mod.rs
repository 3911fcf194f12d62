//! 内部模型
//!
//! `InternalModel` 是两种格式共用的契约，由 Cubism2 / Cubism4 实现；
//! 共用的状态集中在 `InternalModelBase`。

mod base;
mod breath;
pub mod capability;
mod eye_blink;
mod focus;
mod hooks;
mod pose;
mod settings;

pub use base::{
    compute_layout, HitArea, InternalModelBase, InternalModelOptions, ModelLifecycle, LOGICAL_HEIGHT, LOGICAL_WIDTH,
};
pub use breath::{Breath, BreathParameter};
pub use capability::{Capabilities, EyeParameterIds};
pub use eye_blink::{EyeBlink, EyeBlinkTiming, EyeState};
pub use focus::{FocusController, FocusParameters, FocusTuning};
pub use hooks::{HookFn, HookId, ModelHook, ModelHooks};
pub use pose::{Pose, PosePart, DEFAULT_POSE_FADE_TIME};
pub use settings::{ExpressionDef, HitAreaDef, Layout, ModelFormat, ModelSettings, MotionDef};

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Affine2, Vec2};

use crate::gl::{GlContext, GlTextureId};
use crate::moc::CoreModel;
use crate::motion::{ExpressionId, MotionClip, MotionGroups, MotionPriority};
use crate::Result;

/// 按下标或 id 指定可绘制对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawableRef<'a> {
    Index(usize),
    Id(&'a str),
}

/// 轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    /// 平铺 xy 顶点的包围盒
    pub fn from_vertices(vertices: &[f32]) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for xy in vertices.chunks_exact(2) {
            let p = Vec2::new(xy[0], xy[1]);
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        })
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// 已取得的附属文件字节，顺序与设置文件中的声明一致
///
/// 取不到的文件为 None，由各格式在构建时决定如何处理。
#[derive(Debug, Clone, Default)]
pub struct ModelResources {
    pub motions: BTreeMap<String, Vec<Option<Vec<u8>>>>,
    pub expressions: Vec<Option<Vec<u8>>>,
    pub physics: Option<Vec<u8>>,
    pub pose: Option<Vec<u8>>,
}

/// 按设置文件的声明构建动作组
///
/// 缺少字节或解析失败的动作记为 None，播放时跳过。
pub(crate) fn load_motion_groups<F>(settings: &ModelSettings, resources: &ModelResources, mut parse: F) -> MotionGroups
where
    F: FnMut(&str, &MotionDef, &[u8]) -> Result<Rc<dyn MotionClip>>,
{
    settings
        .motions
        .iter()
        .map(|(group, defs)| {
            let bytes = resources.motions.get(group);
            let clips = defs
                .iter()
                .enumerate()
                .map(|(i, def)| {
                    let data = bytes.and_then(|b| b.get(i)).and_then(|b| b.as_deref())?;
                    match parse(group, def, data) {
                        Ok(clip) => Some(clip),
                        Err(e) => {
                            log::warn!("动作 {}[{}] ({}) 解析失败: {}", group, i, def.file, e);
                            None
                        }
                    }
                })
                .collect();
            (group.clone(), clips)
        })
        .collect()
}

/// 按设置文件的声明构建表情列表
pub(crate) fn load_expressions<F>(
    settings: &ModelSettings,
    resources: &ModelResources,
    mut parse: F,
) -> Vec<(String, Option<Rc<dyn MotionClip>>)>
where
    F: FnMut(&[u8]) -> Result<Rc<dyn MotionClip>>,
{
    settings
        .expressions
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let clip = resources
                .expressions
                .get(i)
                .and_then(|b| b.as_deref())
                .and_then(|data| match parse(data) {
                    Ok(clip) => Some(clip),
                    Err(e) => {
                        log::warn!("表情 {} ({}) 解析失败: {}", def.name, def.file, e);
                        None
                    }
                });
            (def.name.clone(), clip)
        })
        .collect()
}

/// 包含该点的全部点击区域名称
pub fn hit_test_areas<M: InternalModel + ?Sized>(model: &M, x: f32, y: f32) -> Vec<String> {
    model
        .hit_area_defs()
        .iter()
        .filter(|area| {
            area.drawable
                .and_then(|index| model.drawable_bounds(index))
                .map_or(false, |bounds| bounds.contains(x, y))
        })
        .map(|area| area.name.clone())
        .collect()
}

/// 两种格式共用的内部模型契约
///
/// 时间参数统一为毫秒，格式内部自行换算。已销毁的模型上所有调用都是空操作。
pub trait InternalModel {
    fn base(&self) -> &InternalModelBase;

    fn base_mut(&mut self) -> &mut InternalModelBase;

    fn core(&self) -> &CoreModel;

    /// 同时借出共享状态和核心模型
    fn parts_mut(&mut self) -> (&mut InternalModelBase, &mut CoreModel);

    /// 推进一帧
    fn update(&mut self, dt: f64, now: f64);

    /// 合成绘制矩阵：`transform * local * centering`
    fn update_transform(&mut self, transform: &Affine2);

    fn draw(&mut self, gl: &mut dyn GlContext) -> Result<()>;

    /// 上下文重建后重建 GPU 资源，模拟状态保留
    fn update_webgl_context(&mut self, gl: &mut dyn GlContext, context_id: u64);

    fn bind_texture(&mut self, index: usize, texture: GlTextureId);

    /// 上传纹理时是否翻转 y
    fn texture_flip_y(&self) -> bool;

    /// 像素空间的顶点
    fn drawable_vertices(&self, drawable: DrawableRef<'_>) -> Result<Vec<f32>>;

    fn wind(&self) -> Option<Vec2>;

    /// 不支持风时返回 false
    fn set_wind(&mut self, wind: Vec2) -> bool;

    fn destroy(&mut self);

    // ========== 以下为默认实现 ==========

    fn format(&self) -> ModelFormat {
        self.base().capabilities.format
    }

    fn capabilities(&self) -> &Capabilities {
        &self.base().capabilities
    }

    fn settings(&self) -> &ModelSettings {
        &self.base().settings
    }

    fn is_destroyed(&self) -> bool {
        self.base().is_destroyed()
    }

    fn width(&self) -> f32 {
        self.base().width
    }

    fn height(&self) -> f32 {
        self.base().height
    }

    fn original_width(&self) -> f32 {
        self.base().original_width
    }

    fn original_height(&self) -> f32 {
        self.base().original_height
    }

    fn local_transform(&self) -> Affine2 {
        self.base().local_transform
    }

    fn drawable_ids(&self) -> Vec<String> {
        self.core().drawable_ids()
    }

    fn drawable_bounds(&self, index: usize) -> Option<Bounds> {
        let vertices = self.drawable_vertices(DrawableRef::Index(index)).ok()?;
        Bounds::from_vertices(&vertices)
    }

    fn hit_area_defs(&self) -> &[HitArea] {
        self.base().hit_areas()
    }

    /// 返回包含该点的全部点击区域名称（画布像素坐标）
    fn hit_test(&self, x: f32, y: f32) -> Vec<String> {
        if self.is_destroyed() {
            return Vec::new();
        }
        hit_test_areas(self, x, y)
    }

    fn parameter_value(&self, id: &str) -> Option<f32> {
        self.core().parameter_value_by_id(id)
    }

    fn set_parameter_value(&mut self, id: &str, value: f32) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let (_, core) = self.parts_mut();
        core.set_parameter_value_by_id(id, value, 1.0)
    }

    fn focus(&mut self, x: f32, y: f32, instant: bool) {
        if !self.is_destroyed() {
            self.base_mut().focus.focus(x, y, instant);
        }
    }

    // ========== 口型 / 开关 ==========

    fn is_lip_sync_enabled(&self) -> bool {
        self.base().lip_sync_enabled
    }

    fn set_lip_sync_enabled(&mut self, enabled: bool) {
        if !self.is_destroyed() {
            self.base_mut().lip_sync_enabled = enabled;
        }
    }

    fn lip_sync_value(&self) -> f32 {
        self.base().lip_sync_value()
    }

    fn set_lip_sync_value(&mut self, value: f32) {
        if !self.is_destroyed() {
            self.base_mut().set_lip_sync_value(value);
        }
    }

    fn is_eye_blink_enabled(&self) -> bool {
        self.base().eye_blink_enabled
    }

    fn set_eye_blink_enabled(&mut self, enabled: bool) {
        if !self.is_destroyed() {
            self.base_mut().eye_blink_enabled = enabled;
        }
    }

    fn is_breath_enabled(&self) -> bool {
        self.base().breath_enabled
    }

    fn set_breath_enabled(&mut self, enabled: bool) {
        if !self.is_destroyed() {
            self.base_mut().breath_enabled = enabled;
        }
    }

    fn eyes_always_look_at_camera(&self) -> bool {
        self.base().eyes_always_look_at_camera
    }

    fn set_eyes_always_look_at_camera(&mut self, locked: bool) {
        if !self.is_destroyed() {
            self.base_mut().eyes_always_look_at_camera = locked;
        }
    }

    // ========== 呼吸 ==========

    fn set_breath_parameters(&mut self, parameters: &[BreathParameter]) {
        if self.is_destroyed() {
            return;
        }
        let (base, core) = self.parts_mut();
        base.set_breath_parameters(core, parameters);
    }

    fn set_breath_intensity(&mut self, intensity: f32) {
        if !self.is_destroyed() {
            self.base_mut().breath.set_intensity(intensity);
        }
    }

    fn set_breath_cycle(&mut self, cycle: f32) {
        if !self.is_destroyed() {
            self.base_mut().breath.set_cycle_scale(cycle);
        }
    }

    // ========== 动作 / 表情 ==========

    fn start_motion(&mut self, group: &str, index: usize, priority: MotionPriority) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.base_mut().motion_manager.start_motion(group, index, priority)
    }

    fn start_random_motion(&mut self, group: &str, priority: MotionPriority) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.base_mut().motion_manager.start_random_motion(group, priority)
    }

    fn stop_all_motions(&mut self) {
        self.base_mut().motion_manager.stop_all_motions();
    }

    fn set_expression(&mut self, id: ExpressionId<'_>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.base_mut().expression_manager.as_mut() {
            Some(expressions) => expressions.set_expression(id),
            None => false,
        }
    }

    fn set_random_expression(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.base_mut().expression_manager.as_mut() {
            Some(expressions) => expressions.set_random_expression(),
            None => false,
        }
    }

    fn reset_expression(&mut self) {
        if let Some(expressions) = self.base_mut().expression_manager.as_mut() {
            expressions.reset_expression();
        }
    }

    // ========== 钩子 ==========

    fn add_hook(&mut self, kind: ModelHook, hook: HookFn) -> Option<HookId> {
        if self.is_destroyed() {
            return None;
        }
        Some(self.base_mut().hooks.on(kind, hook))
    }

    fn remove_hook(&mut self, id: HookId) -> bool {
        self.base_mut().hooks.off(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let bounds = Bounds::from_vertices(&[0.0, 0.0, 10.0, 5.0, 4.0, -2.0]).unwrap();
        assert_eq!(bounds, Bounds { x: 0.0, y: -2.0, width: 10.0, height: 7.0 });
        assert!(bounds.contains(5.0, 0.0));
        assert!(bounds.contains(10.0, 5.0));
        assert!(!bounds.contains(11.0, 0.0));
        assert!(Bounds::from_vertices(&[1.0]).is_none());
    }
}
