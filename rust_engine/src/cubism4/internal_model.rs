//! Cubism4 内部模型
//!
//! 内部计时统一为秒：宿主传入的毫秒在 `update` 入口换算。
//! 顶点为模型单位，`centering` 把原点从画布中心移到左上角并换算成像素。

use std::rc::Rc;

use glam::{Affine2, Vec2};

use super::expression::Expression3;
use super::motion3::Motion3;
use super::physics::Physics3;
use super::pose::parse_pose3;
use crate::config::get_config;
use crate::gl::{affine_to_mvp, GlContext, GlTextureId, MeshRenderer};
use crate::model::capability::{CUBISM4_BREATH_PARAM, CUBISM4_FOCUS_PARAMS, CUBISM4_MOUTH_OPEN_PARAM};
use crate::model::{
    load_expressions, load_motion_groups, BreathParameter, Capabilities, DrawableRef, EyeBlink, EyeBlinkTiming,
    InternalModel, InternalModelBase, InternalModelOptions, ModelFormat, ModelHook, ModelResources, ModelSettings,
    Pose,
};
use crate::moc::CoreModel;
use crate::motion::{ExpressionManager, MotionClip, MotionManager};
use crate::physics::PhysicsRig;
use crate::{Live2dError, Result};

const EYE_BLINK_PARAMS: [&str; 2] = ["ParamEyeROpen", "ParamEyeLOpen"];

/// 默认呼吸：头部三轴、身体和呼吸参数
pub fn default_breath_parameters() -> Vec<BreathParameter> {
    vec![
        BreathParameter::new("ParamAngleX", 0.0, 15.0, 6.5345, 0.5),
        BreathParameter::new("ParamAngleY", 0.0, 8.0, 3.5345, 0.5),
        BreathParameter::new("ParamAngleZ", 0.0, 10.0, 5.5345, 0.5),
        BreathParameter::new("ParamBodyAngleX", 0.0, 4.0, 15.5345, 0.5),
        BreathParameter::new(CUBISM4_BREATH_PARAM, 0.0, 0.5, 3.2345, 0.5),
    ]
}

pub struct Cubism4InternalModel {
    base: InternalModelBase,
    core: CoreModel,
    renderer: MeshRenderer,
    /// 模型单位 → 画布像素
    centering: Affine2,
    eye_blink: Option<EyeBlink>,
    physics: Option<PhysicsRig>,
    pose: Option<Pose>,
    lip_sync_ids: Vec<String>,
    /// 累计秒数，驱动呼吸
    breath_time: f64,
}

impl Cubism4InternalModel {
    pub fn new(
        settings: ModelSettings,
        core: CoreModel,
        resources: &ModelResources,
        options: InternalModelOptions,
    ) -> Result<Self> {
        if settings.format != ModelFormat::Cubism4 {
            return Err(Live2dError::Settings(format!("{} is not a Cubism4 model", settings.url)));
        }
        let config = get_config();

        let groups = load_motion_groups(&settings, resources, |group, def, bytes| {
            let default_fade = if group.eq_ignore_ascii_case("idle") {
                config.idle_motion_fading_duration
            } else {
                config.motion_fading_duration
            } / 1000.0;
            let motion = Motion3::from_slice(
                bytes,
                def.fade_in.map(|ms| ms / 1000.0),
                def.fade_out.map(|ms| ms / 1000.0),
                default_fade,
            )?;
            Ok(Rc::new(motion) as Rc<dyn MotionClip>)
        });

        let expressions = load_expressions(&settings, resources, |bytes| {
            let expression = Expression3::from_slice(bytes, config.expression_fading_duration / 1000.0)?;
            Ok(Rc::new(expression) as Rc<dyn MotionClip>)
        });

        let physics = match &resources.physics {
            Some(bytes) => Some(Physics3::from_slice(bytes)?.into_rig(&core)),
            None => {
                if settings.physics.is_some() {
                    log::debug!("物理文件未提供，跳过: {:?}", settings.physics);
                }
                None
            }
        };

        let pose = match &resources.pose {
            Some(bytes) => Some(parse_pose3(bytes)?),
            None => None,
        };

        let mut capabilities = Capabilities::new(ModelFormat::Cubism4);
        capabilities.wind = physics.as_ref().map_or(false, |p| p.supports_wind());
        capabilities.expressions = !settings.expressions.is_empty();
        capabilities.physics = physics.is_some();
        capabilities.pose = pose.is_some();

        let lip_sync_ids = if settings.lip_sync_ids.is_empty() {
            vec![CUBISM4_MOUTH_OPEN_PARAM.to_string()]
        } else {
            settings.lip_sync_ids.clone()
        };

        let blink_params: Vec<usize> = EYE_BLINK_PARAMS.iter().filter_map(|id| core.parameter_index(id)).collect();
        let eye_blink = if blink_params.is_empty() {
            None
        } else {
            Some(EyeBlink::new(EyeBlinkTiming::SECONDS, blink_params))
        };

        let expression_manager = if expressions.is_empty() {
            None
        } else {
            Some(ExpressionManager::new(expressions))
        };

        let mut base = InternalModelBase::new(
            settings,
            capabilities,
            &core,
            CUBISM4_FOCUS_PARAMS,
            None,
            MotionManager::new(groups),
            expression_manager,
            options,
        );
        base.set_breath_parameters(&core, &default_breath_parameters());

        // 先缩放到像素，再把原点移到画布左上角
        let centering = Affine2::from_translation(Vec2::new(base.original_width / 2.0, base.original_height / 2.0))
            * Affine2::from_scale(Vec2::splat(core.pixels_per_unit()));

        let mut renderer = MeshRenderer::new();
        renderer.set_premultiplied_alpha(true);

        log::info!(
            "Cubism4 模型加载完成: {} (参数 {}, 可绘制 {}, 动作组 {}, 表情 {}, 物理 {}, 姿势 {})",
            base.settings.name,
            core.parameter_count(),
            core.drawable_count(),
            base.motion_manager.group_names().len(),
            base.expression_manager.as_ref().map_or(0, |e| e.len()),
            base.capabilities.physics,
            base.capabilities.pose,
        );

        base.mark_initialized();

        Ok(Self {
            base,
            core,
            renderer,
            centering,
            eye_blink,
            physics,
            pose,
            lip_sync_ids,
            breath_time: 0.0,
        })
    }

    pub fn centering_transform(&self) -> Affine2 {
        self.centering
    }

    pub fn renderer(&self) -> &MeshRenderer {
        &self.renderer
    }

    pub fn lip_sync_ids(&self) -> &[String] {
        &self.lip_sync_ids
    }

    /// 模型单位 → 画布像素（y 向下）
    fn to_canvas(&self, vertices: &[f32]) -> Vec<f32> {
        let ppu = self.core.pixels_per_unit();
        let half_w = self.base.original_width / 2.0;
        let half_h = self.base.original_height / 2.0;
        vertices
            .chunks_exact(2)
            .flat_map(|xy| [xy[0] * ppu + half_w, -xy[1] * ppu + half_h])
            .collect()
    }
}

impl InternalModel for Cubism4InternalModel {
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
        let dt_sec = dt / 1000.0;
        let now_sec = now / 1000.0;
        let lip_sync_weight = get_config().cubism4_lip_sync_weight;

        let base = &mut self.base;
        let core = &mut self.core;

        base.focus.update(dt as f32);
        core.save_parameters();

        base.hooks.emit(ModelHook::BeforeMotionUpdate, core);
        let motion_updated = base.motion_manager.update(core, now_sec);
        base.hooks.emit(ModelHook::AfterMotionUpdate, core);

        if let Some(expressions) = base.expression_manager.as_mut() {
            expressions.update(core, now_sec);
        }

        if !motion_updated && base.eye_blink_enabled {
            if let Some(eye_blink) = self.eye_blink.as_mut() {
                eye_blink.update(core, now_sec);
            }
        }

        base.apply_focus(core);

        self.breath_time += dt_sec;
        base.apply_breath(core, self.breath_time as f32);

        if base.lip_sync_enabled {
            let value = base.lip_sync_value();
            for id in &self.lip_sync_ids {
                core.add_parameter_value_by_id(id, value, lip_sync_weight);
            }
        }

        if let Some(physics) = self.physics.as_mut() {
            physics.evaluate(core, dt_sec as f32);
        }
        if let Some(pose) = self.pose.as_mut() {
            pose.update(core, dt_sec as f32);
        }

        base.hooks.emit(ModelHook::BeforeModelUpdate, core);

        core.update();
        core.load_parameters();
    }

    fn update_transform(&mut self, transform: &Affine2) {
        self.base.drawing_matrix = *transform * self.base.local_transform * self.centering;
    }

    fn draw(&mut self, gl: &mut dyn GlContext) -> Result<()> {
        if self.base.is_destroyed() {
            return Ok(());
        }
        self.renderer.set_mvp(affine_to_mvp(&self.base.drawing_matrix, true));
        let disable_culling = gl.framebuffer_binding().is_some();
        self.renderer
            .draw_model(gl, &self.core, self.base.viewport, disable_culling)?;
        Ok(())
    }

    fn update_webgl_context(&mut self, _gl: &mut dyn GlContext, context_id: u64) {
        if self.base.is_destroyed() {
            return;
        }
        self.renderer.reset_context(context_id);
    }

    fn bind_texture(&mut self, index: usize, texture: GlTextureId) {
        if !self.base.is_destroyed() {
            self.renderer.bind_texture(index, texture);
        }
    }

    fn texture_flip_y(&self) -> bool {
        false
    }

    fn drawable_vertices(&self, drawable: DrawableRef<'_>) -> Result<Vec<f32>> {
        let index = match drawable {
            DrawableRef::Index(index) => index,
            DrawableRef::Id(id) => self
                .core
                .drawable_index(id)
                .ok_or_else(|| Live2dError::DrawableNotFound(id.to_string()))?,
        };
        let vertices = self
            .core
            .drawable_vertices(index)
            .ok_or_else(|| Live2dError::DrawableNotFound(index.to_string()))?;
        Ok(self.to_canvas(vertices))
    }

    fn wind(&self) -> Option<Vec2> {
        self.physics.as_ref().filter(|p| p.supports_wind()).map(|p| p.wind())
    }

    fn set_wind(&mut self, wind: Vec2) -> bool {
        if self.base.is_destroyed() {
            return false;
        }
        match self.physics.as_mut() {
            Some(physics) => physics.set_wind(wind),
            None => false,
        }
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
        log::debug!("Cubism4 模型已销毁: {}", self.base.settings.name);
    }
}
