//! 过渡调度接入
//!
//! 四个槽位：可见属性、参数、焦点、风。
//! 参数过渡不直接写核心模型，而是写进覆盖表，由 BeforeModelUpdate 钩子在
//! 提交前套用，这样动作 / 呼吸等计算结果会被过渡值覆盖。

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use super::{Axis, FocusOptions, Live2DModel, VisualProperty};
use crate::moc::CoreModel;
use crate::model::HookFn;
use crate::transition::{Completion, Easing, TransitionOptions, TransitionTiming, ValueMap};

const APPEAR_DURATION: f64 = 500.0;
const DISAPPEAR_DURATION: f64 = 300.0;

/// 参数过渡当前要套用的值
#[derive(Debug, Default)]
pub(super) struct ParameterOverlay {
    pub(super) values: Option<ValueMap<String>>,
    /// 为 false 时套用一次后清空
    pub(super) active: bool,
}

impl ParameterOverlay {
    pub(super) fn clear(&mut self) {
        self.values = None;
        self.active = false;
    }
}

pub(super) fn parameter_overlay_hook(overlay: Rc<RefCell<ParameterOverlay>>) -> HookFn {
    Box::new(move |core: &mut CoreModel| {
        let mut overlay = overlay.borrow_mut();
        if let Some(values) = &overlay.values {
            for (id, value) in values {
                core.set_parameter_value_by_id(id, *value, 1.0);
            }
        }
        if !overlay.active {
            overlay.values = None;
        }
    })
}

fn default_appear() -> TransitionOptions<VisualProperty> {
    TransitionOptions::new()
        .from_value(VisualProperty::Alpha, 0.0)
        .with_duration(APPEAR_DURATION)
        .with_easing(Easing::EaseOutQuad)
}

fn default_disappear() -> TransitionOptions<VisualProperty> {
    TransitionOptions::new()
        .to_value(VisualProperty::Alpha, 0.0)
        .with_duration(DISAPPEAR_DURATION)
        .with_easing(Easing::EaseInQuad)
}

fn axis_value(v: Vec2, axis: Axis) -> f32 {
    match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
    }
}

fn axis_map(x: f32, y: f32) -> ValueMap<Axis> {
    [(Axis::X, x), (Axis::Y, y)].into_iter().collect()
}

impl Live2DModel {
    // ========== 可见属性 ==========

    pub fn visual_value(&self, property: VisualProperty) -> f32 {
        match property {
            VisualProperty::Alpha => self.alpha,
            VisualProperty::X => self.position.x,
            VisualProperty::Y => self.position.y,
            VisualProperty::Rotation => self.rotation,
            VisualProperty::ScaleX => self.scale.x,
            VisualProperty::ScaleY => self.scale.y,
        }
    }

    pub fn set_visual_value(&mut self, property: VisualProperty, value: f32) {
        match property {
            VisualProperty::Alpha => self.alpha = value,
            VisualProperty::X => self.position.x = value,
            VisualProperty::Y => self.position.y = value,
            VisualProperty::Rotation => self.rotation = value,
            VisualProperty::ScaleX => self.scale.x = value,
            VisualProperty::ScaleY => self.scale.y = value,
        }
    }

    fn apply_visual_values(&mut self, values: &ValueMap<VisualProperty>) {
        for (property, value) in values {
            self.set_visual_value(*property, *value);
        }
    }

    /// 可见属性过渡，取代正在进行的同类过渡
    pub fn transition(&mut self, options: &TransitionOptions<VisualProperty>) -> Completion {
        let snapshot: ValueMap<VisualProperty> = [
            VisualProperty::Alpha,
            VisualProperty::X,
            VisualProperty::Y,
            VisualProperty::Rotation,
            VisualProperty::ScaleX,
            VisualProperty::ScaleY,
        ]
        .into_iter()
        .map(|p| (p, self.visual_value(p)))
        .collect();

        let started = self.visual_transition.start(options, |p| snapshot.get(p).copied());
        if let Some(values) = started.initial {
            self.apply_visual_values(&values);
        }
        started.completion
    }

    /// 从当前值过渡到 `to`
    pub fn transition_to(
        &mut self,
        to: impl IntoIterator<Item = (VisualProperty, f32)>,
        timing: TransitionTiming,
    ) -> Completion {
        let options = TransitionOptions {
            from: ValueMap::new(),
            to: to.into_iter().collect(),
            timing,
        };
        self.transition(&options)
    }

    /// 淡入：默认 500 ms easeOutQuad，alpha 从 0 开始
    pub fn appear(&mut self, options: Option<TransitionOptions<VisualProperty>>) -> Completion {
        let preset = self.options.transitions.appear.clone();
        self.run_preset(default_appear(), preset, options)
    }

    /// 淡出：默认 300 ms easeInQuad，alpha 到 0
    pub fn disappear(&mut self, options: Option<TransitionOptions<VisualProperty>>) -> Completion {
        let preset = self.options.transitions.disappear.clone();
        self.run_preset(default_disappear(), preset, options)
    }

    fn run_preset(
        &mut self,
        default: TransitionOptions<VisualProperty>,
        preset: Option<TransitionOptions<VisualProperty>>,
        options: Option<TransitionOptions<VisualProperty>>,
    ) -> Completion {
        let mut merged = default;
        if let Some(preset) = preset {
            merged = preset.merged_over(&merged);
        }
        if let Some(options) = options {
            merged = options.merged_over(&merged);
        }
        self.transition(&merged)
    }

    pub fn stop_transition(&mut self) -> bool {
        self.visual_transition.stop()
    }

    pub fn is_transitioning(&self) -> bool {
        self.visual_transition.is_active()
    }

    pub(super) fn update_visual_transition(&mut self, dt: f64) {
        if let Some(values) = self.visual_transition.poll(dt).values {
            self.apply_visual_values(&values);
        }
    }

    // ========== 参数 ==========

    /// 参数过渡；未就绪时立即完成
    pub fn transition_parameters(&mut self, options: &TransitionOptions<String>) -> Completion {
        let Some(internal) = self.internal.as_deref() else {
            return Completion::completed();
        };
        let started = self
            .parameter_transition
            .start(options, |id| internal.parameter_value(id));
        if let Some(values) = started.initial {
            let mut overlay = self.parameter_overlay.borrow_mut();
            overlay.values = Some(values);
            overlay.active = self.parameter_transition.is_active();
        }
        started.completion
    }

    pub fn transition_parameters_to<S: Into<String>>(
        &mut self,
        to: impl IntoIterator<Item = (S, f32)>,
        timing: TransitionTiming,
    ) -> Completion {
        let options = TransitionOptions {
            from: ValueMap::new(),
            to: to.into_iter().map(|(id, v)| (id.into(), v)).collect(),
            timing,
        };
        self.transition_parameters(&options)
    }

    pub fn stop_parameter_transition(&mut self) -> bool {
        let stopped = self.parameter_transition.stop();
        self.parameter_overlay.borrow_mut().clear();
        stopped
    }

    pub fn is_parameter_transitioning(&self) -> bool {
        self.parameter_transition.is_active()
    }

    pub(super) fn update_parameter_transition(&mut self, dt: f64) {
        if let Some(values) = self.parameter_transition.poll(dt).values {
            let mut overlay = self.parameter_overlay.borrow_mut();
            overlay.values = Some(values);
            overlay.active = self.parameter_transition.is_active();
        }
    }

    /// 双眼张开程度过渡
    pub fn eye_open(&mut self, value: f32, timing: TransitionTiming) -> Completion {
        let Some(internal) = self.internal.as_deref() else {
            return Completion::completed();
        };
        let eyes = internal.capabilities().eye_params;
        self.transition_parameters_to([(eyes.left_open, value), (eyes.right_open, value)], timing)
    }

    pub fn eye_close(&mut self, timing: TransitionTiming) -> Completion {
        self.eye_open(0.0, timing)
    }

    // ========== 焦点 ==========

    /// 焦点移向 (x, y)，取值 [-1, 1]
    ///
    /// 没有时间参数时交给焦点控制器；否则由过渡逐帧驱动，
    /// 每帧以 instant 写入控制器。
    pub fn look_to(&mut self, x: f32, y: f32, options: FocusOptions) -> Completion {
        let Some(internal) = self.internal.as_deref_mut() else {
            return Completion::completed();
        };
        self.focus_transition.stop();

        if !options.timing.has_timing() {
            internal.focus(x, y, options.instant);
            return Completion::completed();
        }

        let focus = &internal.base().focus;
        let transition = TransitionOptions {
            from: axis_map(focus.x, focus.y),
            to: axis_map(x, y),
            timing: options.timing,
        };
        let started = self.focus_transition.start(&transition, |_| None);
        if let Some(values) = started.initial {
            self.apply_focus_values(&values);
        }
        started.completion
    }

    /// 看向世界坐标中的点
    pub fn look_at(&mut self, x: f32, y: f32, options: FocusOptions) -> Completion {
        match self.focus_direction(x, y) {
            Some(direction) => self.look_to(direction.x, direction.y, options),
            None => Completion::completed(),
        }
    }

    pub fn focus(&mut self, x: f32, y: f32, instant: bool) {
        self.look_at(
            x,
            y,
            FocusOptions {
                timing: TransitionTiming::default(),
                instant,
            },
        );
    }

    /// 世界坐标 → 单位圆上的方向（y 向上为正）
    fn focus_direction(&self, x: f32, y: f32) -> Option<Vec2> {
        let internal = self.internal.as_deref()?;
        let p = self.to_model_position(x, y)?;
        let tx = p.x / internal.original_width() * 2.0 - 1.0;
        let ty = p.y / internal.original_height() * 2.0 - 1.0;
        let radian = ty.atan2(tx);
        Some(Vec2::new(radian.cos(), -radian.sin()))
    }

    fn apply_focus_values(&mut self, values: &ValueMap<Axis>) {
        if let Some(internal) = self.internal.as_deref_mut() {
            let focus = &internal.base().focus;
            let x = values.get(&Axis::X).copied().unwrap_or(focus.target_x);
            let y = values.get(&Axis::Y).copied().unwrap_or(focus.target_y);
            internal.focus(x, y, true);
        }
    }

    pub fn stop_focus_transition(&mut self) -> bool {
        self.focus_transition.stop()
    }

    pub fn is_focus_transitioning(&self) -> bool {
        self.focus_transition.is_active()
    }

    pub(super) fn update_focus_transition(&mut self, dt: f64) {
        if let Some(values) = self.focus_transition.poll(dt).values {
            self.apply_focus_values(&values);
        }
    }

    // ========== 风 ==========

    pub fn is_wind_supported(&self) -> bool {
        self.internal.as_deref().map_or(false, |m| m.capabilities().wind)
    }

    /// 不支持风时为 None
    pub fn wind(&self) -> Option<Vec2> {
        self.internal.as_deref()?.wind()
    }

    pub fn set_wind(&mut self, x: f32, y: f32) -> bool {
        match self.internal.as_deref_mut() {
            Some(internal) => internal.set_wind(Vec2::new(x, y)),
            None => false,
        }
    }

    /// 风过渡；不支持风时立即完成
    pub fn transition_wind(&mut self, options: &TransitionOptions<Axis>) -> Completion {
        let Some(wind) = self.wind() else {
            log::debug!("{} wind is not supported", self.tag());
            return Completion::completed();
        };
        let started = self
            .wind_transition
            .start(options, |axis| Some(axis_value(wind, *axis)));
        if let Some(values) = started.initial {
            self.apply_wind_values(&values);
        }
        started.completion
    }

    pub fn wind_to(&mut self, x: f32, y: f32, timing: TransitionTiming) -> Completion {
        let options = TransitionOptions {
            from: ValueMap::new(),
            to: axis_map(x, y),
            timing,
        };
        self.transition_wind(&options)
    }

    fn apply_wind_values(&mut self, values: &ValueMap<Axis>) {
        if let Some(wind) = self.wind() {
            let x = values.get(&Axis::X).copied().unwrap_or(wind.x);
            let y = values.get(&Axis::Y).copied().unwrap_or(wind.y);
            self.set_wind(x, y);
        }
    }

    pub fn stop_wind_transition(&mut self) -> bool {
        self.wind_transition.stop()
    }

    pub fn is_wind_transitioning(&self) -> bool {
        self.wind_transition.is_active()
    }

    pub(super) fn update_wind_transition(&mut self, dt: f64) {
        if let Some(values) = self.wind_transition.poll(dt).values {
            self.apply_wind_values(&values);
        }
    }

    /// 停止全部过渡，不写入目标值
    pub(super) fn stop_all_transitions(&mut self) {
        self.stop_transition();
        self.stop_parameter_transition();
        self.stop_focus_transition();
        self.stop_wind_transition();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Live2DModelOptions;
    use crate::factory::{Live2DFactory, MemoryAssetSource};
    use crate::model::ModelHook;
    use crate::testing::{cubism4_moc_json, cubism4_settings_json, png_bytes};
    use crate::transition::CompletionState;

    fn model() -> Live2DModel {
        let source = MemoryAssetSource::new()
            .with("haru/haru.model3.json", cubism4_settings_json())
            .with("haru/model.moc.json", cubism4_moc_json())
            .with("haru/textures/texture_00.png", png_bytes(2, 2, [255, 255, 255, 255]));
        Live2DModel::load(&Live2DFactory::new(source), "haru/haru.model3.json", Live2DModelOptions::default())
            .unwrap()
    }

    #[test]
    fn test_appear_reaches_full_alpha() {
        let mut model = model();
        let done = model.appear(None);
        assert_eq!(model.alpha(), 0.0);
        assert!(model.is_transitioning());

        for _ in 0..32 {
            model.update(16.0);
        }
        assert_eq!(model.alpha(), 1.0);
        assert!(done.is_resolved());
        assert!(!model.is_transitioning());
    }

    #[test]
    fn test_disappear_with_override() {
        let mut model = model();
        let done = model.disappear(Some(TransitionOptions::new().with_duration(100.0)));
        model.update(50.0);
        // easeInQuad(0.5) = 0.25
        assert!((model.alpha() - 0.75).abs() < 1e-5);
        model.update(50.0);
        assert_eq!(model.alpha(), 0.0);
        assert_eq!(done.state(), CompletionState::Completed);
    }

    #[test]
    fn test_new_transition_supersedes() {
        let mut model = model();
        let first = model.transition_to([(VisualProperty::X, 100.0)], TransitionTiming::new().with_duration(100.0));
        model.update(50.0);
        let second = model.transition_to([(VisualProperty::Y, 10.0)], TransitionTiming::new().with_duration(100.0));
        assert_eq!(first.state(), CompletionState::Cancelled);
        assert!(first.is_resolved());

        let x = model.position().x;
        model.update(100.0);
        assert_eq!(model.position().x, x);
        assert_eq!(model.position().y, 10.0);
        assert_eq!(second.state(), CompletionState::Completed);
    }

    #[test]
    fn test_delayed_visual_transition_holds() {
        let mut model = model();
        model.transition(
            &TransitionOptions::new()
                .from_value(VisualProperty::Rotation, 1.0)
                .to_value(VisualProperty::Rotation, 2.0)
                .with_delay(100.0)
                .with_duration(100.0),
        );
        assert_eq!(model.rotation(), 1.0);
        model.set_rotation(0.5);
        model.update(50.0);
        // 延迟期间不写入
        assert_eq!(model.rotation(), 0.5);
        model.update(150.0);
        assert_eq!(model.rotation(), 2.0);
    }

    #[test]
    fn test_parameter_transition_through_hook() {
        let mut model = model();
        let captured = Rc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        model.internal_model_mut().unwrap().add_hook(
            ModelHook::BeforeModelUpdate,
            Box::new(move |core: &mut CoreModel| {
                sink.borrow_mut().push(core.parameter_value_by_id("ParamAngleY"));
            }),
        );

        let done = model.transition_parameters_to([("ParamAngleY", 10.0)], TransitionTiming::new().with_duration(100.0));
        assert!(model.is_parameter_transitioning());
        model.update(100.0);
        assert!(done.is_resolved());

        model.internal_model_mut().unwrap().update(16.0, 16.0);
        assert_eq!(captured.borrow().last(), Some(&Some(10.0)));
        // 完成后只套用一次
        assert!(model.parameter_overlay.borrow().values.is_none());
    }

    #[test]
    fn test_unknown_parameters_complete_immediately() {
        let mut model = model();
        let done = model.transition_parameters_to([("Missing", 1.0)], TransitionTiming::new().with_duration(100.0));
        assert!(done.is_resolved());
        assert!(!model.is_parameter_transitioning());
    }

    #[test]
    fn test_eye_close_targets_both_eyes() {
        let mut model = model();
        model.eye_close(TransitionTiming::new().with_duration(0.0));
        let overlay = model.parameter_overlay.borrow();
        let values = overlay.values.as_ref().unwrap();
        assert_eq!(values.get("ParamEyeLOpen"), Some(&0.0));
        assert_eq!(values.get("ParamEyeROpen"), Some(&0.0));
    }

    #[test]
    fn test_look_to_without_timing() {
        let mut model = model();
        assert!(model.look_to(0.5, -0.5, FocusOptions::instant()).is_resolved());
        let focus = &model.internal_model().unwrap().base().focus;
        assert_eq!((focus.x, focus.y), (0.5, -0.5));
        assert!(!model.is_focus_transitioning());
    }

    #[test]
    fn test_look_to_with_timing() {
        let mut model = model();
        let done = model.look_to(1.0, 0.0, FocusOptions::with_timing(TransitionTiming::new().with_duration(100.0)));
        assert!(model.is_focus_transitioning());
        model.update(50.0);
        let x = model.internal_model().unwrap().base().focus.x;
        assert!((x - 0.5).abs() < 1e-5);
        model.update(50.0);
        assert_eq!(model.internal_model().unwrap().base().focus.x, 1.0);
        assert!(done.is_resolved());
    }

    #[test]
    fn test_focus_projects_onto_unit_circle() {
        let mut model = model();
        let internal = model.internal_model().unwrap();
        let right = model
            .world_transform()
            .transform_point2(internal.local_transform().transform_point2(Vec2::new(internal.original_width(), internal.original_height() / 2.0)));

        model.focus(right.x, right.y, true);
        let focus = &model.internal_model().unwrap().base().focus;
        assert!((focus.x - 1.0).abs() < 1e-5);
        assert!(focus.y.abs() < 1e-5);
    }

    #[test]
    fn test_wind_without_support_resolves() {
        let mut model = model();
        assert!(!model.is_wind_supported());
        assert!(model.wind().is_none());
        let done = model.wind_to(1.0, 0.0, TransitionTiming::new().with_duration(1000.0));
        assert!(done.is_resolved());
        assert!(!model.is_wind_transitioning());
        assert!(!model.set_wind(1.0, 0.0));
    }
}
