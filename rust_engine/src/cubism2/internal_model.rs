//! Cubism2 内部模型
//!
//! 计时全部为毫秒。顶点已是画布像素，绘制矩阵不翻转 y。

use std::rc::Rc;

use glam::{Affine2, Vec2};

use super::expression::Expression2;
use super::mtn::MtnMotion;
use super::physics::physics2_rig;
use super::pose::parse_pose2;
use crate::config::get_config;
use crate::gl::{affine_to_mvp, GlContext, GlTextureId, MeshRenderer};
use crate::model::capability::{CUBISM2_BREATH_PARAM, CUBISM2_FOCUS_PARAMS, CUBISM2_MOUTH_OPEN_PARAM};
use crate::model::{
    hit_test_areas, load_expressions, load_motion_groups, BreathParameter, Capabilities, DrawableRef, EyeBlink,
    EyeBlinkTiming, InternalModel, InternalModelBase, InternalModelOptions, ModelFormat, ModelHook, ModelResources,
    ModelSettings, Pose,
};
use crate::moc::CoreModel;
use crate::motion::{ExpressionManager, MotionClip, MotionManager};
use crate::physics::PhysicsRig;
use crate::{Live2dError, Result};

const EYE_BLINK_PARAMS: [&str; 2] = ["PARAM_EYE_L_OPEN", "PARAM_EYE_R_OPEN"];

/// 默认呼吸
pub fn default_breath_parameters() -> Vec<BreathParameter> {
    vec![
        BreathParameter::new("PARAM_ANGLE_X", 0.0, 15.0, 6.5345, 0.5),
        BreathParameter::new("PARAM_ANGLE_Y", 0.0, 8.0, 3.5345, 0.5),
        BreathParameter::new("PARAM_ANGLE_Z", 0.0, 10.0, 5.5345, 0.5),
        BreathParameter::new("PARAM_BODY_ANGLE_X", 0.0, 4.0, 15.5345, 0.5),
        BreathParameter::new(CUBISM2_BREATH_PARAM, 0.5, 0.5, 3.2345, 1.0),
    ]
}

pub struct Cubism2InternalModel {
    base: InternalModelBase,
    core: CoreModel,
    renderer: MeshRenderer,
    eye_blink: Option<EyeBlink>,
    physics: Option<PhysicsRig>,
    pose: Option<Pose>,
    mouth_open_index: Option<usize>,
    /// 上一帧的时间戳，物理按差值推进
    last_physics_time: Option<f64>,
    draw_data_count: usize,
    has_drawn: bool,
    /// 为 true 时绘制总是关闭背面剔除
    pub disable_culling: bool,
}

impl Cubism2InternalModel {
    pub fn new(
        settings: ModelSettings,
        mut core: CoreModel,
        resources: &ModelResources,
        options: InternalModelOptions,
    ) -> Result<Self> {
        if settings.format != ModelFormat::Cubism2 {
            return Err(Live2dError::Settings(format!("{} is not a Cubism2 model", settings.url)));
        }
        let config = get_config();

        let groups = load_motion_groups(&settings, resources, |group, def, bytes| {
            let default_fade = if group.eq_ignore_ascii_case("idle") {
                config.idle_motion_fading_duration
            } else {
                config.motion_fading_duration
            };
            let motion = MtnMotion::from_slice(bytes, def.fade_in, def.fade_out, default_fade)?;
            Ok(Rc::new(motion) as Rc<dyn MotionClip>)
        });

        let expressions = load_expressions(&settings, resources, |bytes| {
            let expression = Expression2::from_slice(bytes, config.expression_fading_duration)?;
            Ok(Rc::new(expression) as Rc<dyn MotionClip>)
        });

        let physics = match &resources.physics {
            Some(bytes) => Some(physics2_rig(bytes, &core)?),
            None => None,
        };
        let pose = match &resources.pose {
            Some(bytes) => Some(parse_pose2(bytes)?),
            None => None,
        };

        let mut capabilities = Capabilities::new(ModelFormat::Cubism2);
        capabilities.expressions = !settings.expressions.is_empty();
        capabilities.physics = physics.is_some();
        capabilities.pose = pose.is_some();

        // 初始参数与部件不透明度
        for (id, value) in &settings.init_params {
            core.set_parameter_value_by_id(id, *value, 1.0);
        }
        for (id, value) in &settings.init_opacities {
            core.set_part_opacity_by_id(id, *value);
        }
        core.save_parameters();

        let blink_params: Vec<usize> = EYE_BLINK_PARAMS.iter().filter_map(|id| core.parameter_index(id)).collect();
        let eye_blink = if blink_params.is_empty() {
            None
        } else {
            Some(EyeBlink::new(EyeBlinkTiming::MILLISECONDS, blink_params))
        };

        let expression_manager = if expressions.is_empty() {
            None
        } else {
            Some(ExpressionManager::new(expressions))
        };

        let mouth_open_index = core.parameter_index(CUBISM2_MOUTH_OPEN_PARAM);
        let draw_data_count = core.drawable_count();

        let mut base = InternalModelBase::new(
            settings,
            capabilities,
            &core,
            CUBISM2_FOCUS_PARAMS,
            Some(CUBISM2_BREATH_PARAM),
            MotionManager::new(groups),
            expression_manager,
            options,
        );
        base.set_breath_parameters(&core, &default_breath_parameters());

        let mut renderer = MeshRenderer::new();
        // 遮罩绘制后恢复宿主视口
        renderer.clipping_mut().set_restore_viewport(true);

        log::info!(
            "Cubism2 模型加载完成: {} (参数 {}, 可绘制 {}, 动作组 {}, 物理 {}, 姿势 {})",
            base.settings.name,
            core.parameter_count(),
            draw_data_count,
            base.motion_manager.group_names().len(),
            base.capabilities.physics,
            base.capabilities.pose,
        );

        base.mark_initialized();

        Ok(Self {
            base,
            core,
            renderer,
            eye_blink,
            physics,
            pose,
            mouth_open_index,
            last_physics_time: None,
            draw_data_count,
            has_drawn: false,
            disable_culling: false,
        })
    }

    pub fn draw_data_count(&self) -> usize {
        self.draw_data_count
    }

    pub fn has_drawn(&self) -> bool {
        self.has_drawn
    }

    pub fn renderer(&self) -> &MeshRenderer {
        &self.renderer
    }
}

impl InternalModel for Cubism2InternalModel {
    fn base(&self) -> &InternalModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut InternalModelBase {
        &mut self.base
    }

    fn core(&self) -> &CoreModel {
        &self.core
    }

    fn parts_mut(&mut self) -> (&mut InternalModelBase, &mut CoreModel) {
        (&mut self.base, &mut self.core)
    }

    fn update(&mut self, dt: f64, now: f64) {
        if !self.base.begin_update() {
            return;
        }
        let base = &mut self.base;
        let core = &mut self.core;

        base.focus.update(dt as f32);
        core.save_parameters();

        base.hooks.emit(ModelHook::BeforeMotionUpdate, core);
        let motion_updated = base.motion_manager.update(core, now);
        base.hooks.emit(ModelHook::AfterMotionUpdate, core);

        if let Some(expressions) = base.expression_manager.as_mut() {
            expressions.update(core, now);
        }

        if !motion_updated && base.eye_blink_enabled {
            if let Some(eye_blink) = self.eye_blink.as_mut() {
                eye_blink.update(core, now);
            }
        }

        base.apply_focus(core);
        base.apply_breath(core, (now / 1000.0) as f32);

        if base.lip_sync_enabled {
            if let Some(index) = self.mouth_open_index {
                core.set_parameter_value(index, base.lip_sync_value(), 1.0);
            }
        }

        if let Some(physics) = self.physics.as_mut() {
            let elapsed = self.last_physics_time.map_or(dt, |last| now - last);
            physics.evaluate(core, elapsed as f32);
        }
        self.last_physics_time = Some(now);

        if let Some(pose) = self.pose.as_mut() {
            pose.update(core, dt as f32);
        }

        base.hooks.emit(ModelHook::BeforeModelUpdate, core);

        core.update();
        core.load_parameters();
    }

    fn update_transform(&mut self, transform: &Affine2) {
        self.base.drawing_matrix = *transform * self.base.local_transform;
    }

    fn draw(&mut self, gl: &mut dyn GlContext) -> Result<()> {
        if self.base.is_destroyed() {
            return Ok(());
        }
        // 画到帧缓冲时必须关闭剔除
        let disable_culling = self.disable_culling || gl.framebuffer_binding().is_some();

        self.renderer.set_mvp(affine_to_mvp(&self.base.drawing_matrix, false));
        self.renderer
            .draw_model(gl, &self.core, self.base.viewport, disable_culling)?;
        self.has_drawn = true;
        Ok(())
    }

    fn update_webgl_context(&mut self, gl: &mut dyn GlContext, context_id: u64) {
        if self.base.is_destroyed() {
            return;
        }
        self.renderer.reset_context(context_id);

        // 重建遮罩目标后恢复宿主绑定的帧缓冲
        let framebuffer = gl.framebuffer_binding();
        if let Err(e) = self.renderer.clipping_mut().ensure_mask_target(gl) {
            log::warn!("Cubism2 遮罩目标重建失败: {}", e);
        }
        gl.bind_framebuffer(framebuffer);
    }

    fn bind_texture(&mut self, index: usize, texture: GlTextureId) {
        if !self.base.is_destroyed() {
            self.renderer.bind_texture(index, texture);
        }
    }

    fn texture_flip_y(&self) -> bool {
        true
    }

    fn drawable_ids(&self) -> Vec<String> {
        let mut ids = self.core.drawable_ids();
        ids.truncate(self.draw_data_count);
        ids
    }

    fn drawable_vertices(&self, drawable: DrawableRef<'_>) -> Result<Vec<f32>> {
        let index = match drawable {
            DrawableRef::Index(index) => index,
            DrawableRef::Id(id) => self
                .core
                .drawable_index(id)
                .ok_or_else(|| Live2dError::DrawableNotFound(id.to_string()))?,
        };
        self.core
            .drawable_vertices(index)
            .map(|v| v.to_vec())
            .ok_or_else(|| Live2dError::DrawableNotFound(index.to_string()))
    }

    /// 绘制前顶点数据未就绪，结果为空
    fn hit_test(&self, x: f32, y: f32) -> Vec<String> {
        if self.base.is_destroyed() {
            return Vec::new();
        }
        if !self.has_drawn {
            log::warn!(
                "Trying to hit-test a Cubism 2 model that has not been rendered yet ({}), the result is always empty",
                self.base.settings.name
            );
            return Vec::new();
        }
        hit_test_areas(self, x, y)
    }

    fn wind(&self) -> Option<Vec2> {
        None
    }

    fn set_wind(&mut self, _wind: Vec2) -> bool {
        false
    }

    fn destroy(&mut self) {
        if self.base.is_destroyed() {
            return;
        }
        self.base.destroy();
        self.physics = None;
        self.pose = None;
        self.eye_blink = None;
        self.renderer = MeshRenderer::new();
        log::debug!("Cubism2 模型已销毁: {}", self.base.settings.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionPriority;
    use crate::testing::{cubism2_moc_json, cubism2_settings_json, RecordingGl};
    use std::cell::RefCell;

    const IDLE_MTN: &str = "$fps=30\nPARAM_ANGLE_Z=5,5,5,5,5,5,5,5,5,5\n";

    fn settings() -> ModelSettings {
        ModelSettings::from_slice(cubism2_settings_json().as_bytes(), "https://example.com/shizuku/shizuku.model.json")
            .unwrap()
    }

    fn core() -> CoreModel {
        CoreModel::from_slice(cubism2_moc_json().as_bytes()).unwrap()
    }

    fn model_with(resources: ModelResources) -> Cubism2InternalModel {
        Cubism2InternalModel::new(settings(), core(), &resources, InternalModelOptions::default()).unwrap()
    }

    fn model() -> Cubism2InternalModel {
        model_with(ModelResources::default())
    }

    fn capture(model: &mut Cubism2InternalModel, id: &'static str) -> Rc<RefCell<Vec<Option<f32>>>> {
        let captured = Rc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        model.add_hook(
            ModelHook::BeforeModelUpdate,
            Box::new(move |core: &mut CoreModel| {
                sink.borrow_mut().push(core.parameter_value_by_id(id));
            }),
        );
        captured
    }

    #[test]
    fn test_capabilities() {
        let model = model();
        assert_eq!(model.format(), ModelFormat::Cubism2);
        assert!(!model.capabilities().wind);
        assert!(model.texture_flip_y());
        assert_eq!(model.draw_data_count(), model.core().drawable_count());
        assert_eq!(model.drawable_ids().len(), model.draw_data_count());
    }

    #[test]
    fn test_init_params_applied() {
        let model = model();
        // 设置文件的 init_param 把 PARAM_ANGLE_X 设为 10
        assert_eq!(model.parameter_value("PARAM_ANGLE_X"), Some(10.0));
    }

    #[test]
    fn test_hit_test_before_draw_is_empty() {
        let mut model = model();
        let index = model.core().drawable_index("D_REF.BODY").unwrap();
        let bounds = model.drawable_bounds(index).unwrap();
        let (cx, cy) = (bounds.x + bounds.width / 2.0, bounds.y + bounds.height / 2.0);

        assert!(model.hit_test(cx, cy).is_empty());

        let mut gl = RecordingGl::default();
        model.draw(&mut gl).unwrap();
        assert!(model.has_drawn());
        assert_eq!(model.hit_test(cx, cy), vec!["body".to_string()]);
    }

    #[test]
    fn test_lip_sync_sets_value() {
        let mut model = model();
        model.set_lip_sync_enabled(true);
        model.set_lip_sync_value(0.7);
        let captured = capture(&mut model, "PARAM_MOUTH_OPEN_Y");
        model.update(16.0, 1000.0);
        assert!((captured.borrow()[0].unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_breath_sets_canonical_parameter() {
        let mut model = model();
        let captured = capture(&mut model, "PARAM_BREATH");
        // now = 0 时 sin 为 0，只剩 offset
        model.update(16.0, 0.0);
        assert!((captured.borrow()[0].unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_motion_suppresses_eye_blink() {
        let mut resources = ModelResources::default();
        resources
            .motions
            .insert("idle".to_string(), vec![Some(IDLE_MTN.as_bytes().to_vec())]);
        let mut model = model_with(resources);
        let captured = capture(&mut model, "PARAM_EYE_L_OPEN");
        model.update(16.0, 16.0);
        assert_eq!(captured.borrow()[0], Some(0.0));

        let mut model = self::model();
        let captured = capture(&mut model, "PARAM_EYE_L_OPEN");
        model.update(16.0, 16.0);
        assert_eq!(captured.borrow()[0], Some(1.0));
    }

    #[test]
    fn test_culling_flag() {
        let mut model = model();
        let mut gl = RecordingGl::default();
        model.draw(&mut gl).unwrap();
        assert!(gl.draws.iter().any(|d| d.culling));

        model.disable_culling = true;
        let mut gl = RecordingGl::default();
        model.draw(&mut gl).unwrap();
        assert!(gl.draws.iter().all(|d| !d.culling));
        assert!(model.disable_culling);

        model.disable_culling = false;
        let mut gl = RecordingGl::default();
        gl.bound_framebuffer = Some(2);
        model.draw(&mut gl).unwrap();
        assert!(gl.draws.iter().all(|d| !d.culling));
        assert!(!model.disable_culling);
    }

    #[test]
    fn test_draw_does_not_invert_y() {
        let mut model = model();
        let mut gl = RecordingGl::default();
        let transform = Affine2::from_translation(Vec2::new(10.0, 20.0));
        model.update_transform(&transform);
        model.draw(&mut gl).unwrap();
        let expected = affine_to_mvp(&(transform * model.local_transform()), false);
        assert_eq!(gl.draws[0].mvp, expected);
        assert!(gl.draws.iter().all(|d| !d.premultiplied_alpha));
    }

    #[test]
    fn test_update_webgl_context_restores_framebuffer() {
        let mut model = model();
        let mut gl = RecordingGl::default();
        gl.bound_framebuffer = Some(4);
        model.update_webgl_context(&mut gl, 11);
        assert_eq!(gl.bound_framebuffer, Some(4));
        assert_eq!(model.renderer().clipping().frame_no(), 11);
        assert!(model.renderer().clipping().mask_texture().is_some());
    }

    #[test]
    fn test_start_motion_priority() {
        let mut settings = settings();
        settings.motions.insert(
            "tap_body".to_string(),
            vec![crate::model::MotionDef {
                file: "motions/tap.mtn".into(),
                ..Default::default()
            }],
        );
        let mut resources = ModelResources::default();
        resources
            .motions
            .insert("tap_body".to_string(), vec![Some(IDLE_MTN.as_bytes().to_vec())]);
        let mut model = Cubism2InternalModel::new(settings, core(), &resources, Default::default()).unwrap();
        assert!(model.start_motion("tap_body", 0, MotionPriority::Normal));
        assert!(!model.start_motion("tap_body", 0, MotionPriority::Idle));
        assert!(!model.start_motion("tap_body", 3, MotionPriority::Force));
    }

    #[test]
    fn test_wind_unsupported() {
        let mut model = model();
        assert!(!model.set_wind(Vec2::X));
        assert!(model.wind().is_none());
    }
}
