//! 内部模型共享状态
//!
//! 两种格式都持有一份 `InternalModelBase`：设置、能力、焦点、呼吸、
//! 钩子、动作 / 表情管理、布局变换和生命周期。

use glam::{Affine2, Vec2};

use super::breath::{Breath, BreathParameter};
use super::capability::Capabilities;
use super::focus::{FocusController, FocusParameters, FocusTuning};
use super::hooks::ModelHooks;
use super::settings::{ModelSettings, Layout};
use crate::moc::CoreModel;
use crate::motion::{ExpressionManager, MotionManager};

/// 逻辑尺寸
pub const LOGICAL_WIDTH: f32 = 2.0;
pub const LOGICAL_HEIGHT: f32 = 2.0;

/// 生命周期，`Destroyed` 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLifecycle {
    Constructed,
    Initialized,
    Updating,
    Destroyed,
}

/// 已解析的点击区域
#[derive(Debug, Clone, PartialEq)]
pub struct HitArea {
    pub name: String,
    pub id: String,
    /// 模型中找不到该可绘制对象时为 None
    pub drawable: Option<usize>,
}

/// 内部模型选项
#[derive(Debug, Clone)]
pub struct InternalModelOptions {
    pub breath_enabled: bool,
    pub eye_blink_enabled: bool,
    pub lip_sync_enabled: bool,
    pub eyes_always_look_at_camera: bool,
    pub focus_tuning: FocusTuning,
}

impl Default for InternalModelOptions {
    fn default() -> Self {
        Self {
            breath_enabled: true,
            eye_blink_enabled: true,
            lip_sync_enabled: false,
            eyes_always_look_at_camera: false,
            focus_tuning: FocusTuning::default(),
        }
    }
}

pub struct InternalModelBase {
    pub settings: ModelSettings,
    pub capabilities: Capabilities,

    // 模拟
    pub focus: FocusController,
    pub focus_tuning: FocusTuning,
    focus_params: FocusParameters,
    pub breath: Breath,
    pub hooks: ModelHooks,
    pub motion_manager: MotionManager,
    pub expression_manager: Option<ExpressionManager>,

    // 开关
    pub eye_blink_enabled: bool,
    pub breath_enabled: bool,
    pub lip_sync_enabled: bool,
    lip_sync_value: f32,
    pub eyes_always_look_at_camera: bool,

    // 布局
    pub original_width: f32,
    pub original_height: f32,
    pub width: f32,
    pub height: f32,
    pub local_transform: Affine2,
    /// 最近一次 `update_transform` 合成的绘制矩阵
    pub drawing_matrix: Affine2,
    /// 宿主视口 `[x, y, w, h]`
    pub viewport: [f32; 4],

    lifecycle: ModelLifecycle,
    hit_areas: Vec<HitArea>,
}

impl InternalModelBase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: ModelSettings,
        capabilities: Capabilities,
        core: &CoreModel,
        focus_ids: [&str; 6],
        breath_id: Option<&str>,
        motion_manager: MotionManager,
        expression_manager: Option<ExpressionManager>,
        options: InternalModelOptions,
    ) -> Self {
        let hit_areas = settings
            .hit_areas
            .iter()
            .map(|h| HitArea {
                name: h.name.clone(),
                id: h.id.clone(),
                drawable: core.drawable_index(&h.id),
            })
            .collect();

        let mut base = Self {
            settings,
            capabilities,
            focus: FocusController::new(),
            focus_tuning: options.focus_tuning,
            focus_params: FocusParameters::resolve(core, focus_ids),
            breath: Breath::new(breath_id.and_then(|id| core.parameter_index(id))),
            hooks: ModelHooks::new(),
            motion_manager,
            expression_manager,
            eye_blink_enabled: options.eye_blink_enabled,
            breath_enabled: options.breath_enabled,
            lip_sync_enabled: options.lip_sync_enabled,
            lip_sync_value: 0.0,
            eyes_always_look_at_camera: options.eyes_always_look_at_camera,
            original_width: core.canvas_width(),
            original_height: core.canvas_height(),
            width: core.canvas_width(),
            height: core.canvas_height(),
            local_transform: Affine2::IDENTITY,
            drawing_matrix: Affine2::IDENTITY,
            viewport: [0.0, 0.0, 800.0, 600.0],
            lifecycle: ModelLifecycle::Constructed,
            hit_areas,
        };
        base.setup_layout();
        base
    }

    pub fn lifecycle(&self) -> ModelLifecycle {
        self.lifecycle
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == ModelLifecycle::Destroyed
    }

    /// 初始化完成
    pub fn mark_initialized(&mut self) {
        if self.lifecycle == ModelLifecycle::Constructed {
            self.lifecycle = ModelLifecycle::Initialized;
        }
    }

    /// 进入更新，已销毁时返回 false
    pub fn begin_update(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.lifecycle = ModelLifecycle::Updating;
        true
    }

    /// 释放模拟状态并进入终态
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.hooks.clear();
        self.motion_manager.stop_all_motions();
        if let Some(expressions) = self.expression_manager.as_mut() {
            expressions.stop_all();
        }
        self.lip_sync_value = 0.0;
        self.lifecycle = ModelLifecycle::Destroyed;
    }

    pub fn hit_areas(&self) -> &[HitArea] {
        &self.hit_areas
    }

    pub fn lip_sync_value(&self) -> f32 {
        self.lip_sync_value
    }

    /// 钳制到 [0, 1]，非有限值视为 0
    pub fn set_lip_sync_value(&mut self, value: f32) {
        self.lip_sync_value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    }

    /// 逻辑布局 → 局部变换（先缩放后平移）
    pub fn setup_layout(&mut self) {
        let (local, width, height) = compute_layout(&self.settings.layout, self.original_width, self.original_height);
        self.local_transform = local;
        self.width = width;
        self.height = height;
    }

    /// 把当前焦点写入参数
    pub fn apply_focus(&self, core: &mut CoreModel) {
        self.focus_tuning.apply(
            core,
            &self.focus_params,
            self.focus.x,
            self.focus.y,
            self.eyes_always_look_at_camera,
        );
    }

    /// 呼吸，t 为秒
    pub fn apply_breath(&self, core: &mut CoreModel, t: f32) {
        if self.breath_enabled {
            self.breath.apply(core, t);
        }
    }

    pub fn set_breath_parameters(&mut self, core: &CoreModel, parameters: &[BreathParameter]) {
        self.breath.set_parameters(core, parameters);
    }

    /// 模型局部坐标 → 画布像素
    pub fn model_to_canvas(&self, point: Vec2) -> Vec2 {
        self.local_transform.inverse().transform_point2(point)
    }
}

/// 返回 (局部变换, 宽, 高)
pub fn compute_layout(layout: &Layout, original_width: f32, original_height: f32) -> (Affine2, f32, f32) {
    let logical_width = layout.width.unwrap_or(LOGICAL_WIDTH);
    let logical_height = layout.height.unwrap_or(LOGICAL_HEIGHT);

    let scale = Vec2::new(logical_width / LOGICAL_WIDTH, logical_height / LOGICAL_HEIGHT);
    let width = original_width * scale.x;
    let height = original_height * scale.y;

    let offset_x = layout
        .x
        .map(|x| x - logical_width / 2.0)
        .or(layout.center_x)
        .or(layout.left.map(|l| l - logical_width / 2.0))
        .or(layout.right.map(|r| r + logical_width / 2.0))
        .unwrap_or(0.0);
    let offset_y = layout
        .y
        .map(|y| y - logical_height / 2.0)
        .or(layout.center_y)
        .or(layout.top.map(|t| t - logical_height / 2.0))
        .or(layout.bottom.map(|b| b + logical_height / 2.0))
        .unwrap_or(0.0);

    let local = Affine2::from_translation(Vec2::new(width * offset_x, -height * offset_y)) * Affine2::from_scale(scale);
    (local, width, height)
}
