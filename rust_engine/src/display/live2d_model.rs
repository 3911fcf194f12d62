//! Live2DModel - 场景中的模型对象

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Affine2, Vec2};

use super::speech::SpeechSession;
use super::transitions::{parameter_overlay_hook, ParameterOverlay};
use super::{AutoTransitionTrigger, Axis, DestroyOptions, Live2DModelOptions, ModelEvent, VisualProperty};
use crate::audio::{AudioAnalyzer, AudioBackend};
use crate::factory::{Live2DFactory, LoadedModel, SharedTextureCache};
use crate::gl::{screen_projection, GlTextureId, Renderer, SharedRenderer};
use crate::model::{Bounds, BreathParameter, HookId, InternalModel, ModelHook};
use crate::motion::{ExpressionId, MotionPriority};
use crate::texture::Texture;
use crate::transition::{DelayBehavior, TransitionSlot};
use crate::{Live2dError, Result};

/// 屏幕尺寸未知时的视口
const FALLBACK_SCREEN_SIZE: (f32, f32) = (800.0, 600.0);

pub struct Live2DModel {
    pub(super) internal: Option<Box<dyn InternalModel>>,
    pub(super) options: Live2DModelOptions,
    tag: String,

    // ====== 可见属性 ======
    pub(super) alpha: f32,
    pub(super) position: Vec2,
    /// 弧度
    pub(super) rotation: f32,
    pub(super) scale: Vec2,
    pub(super) pivot: Vec2,
    anchor: Vec2,
    parent_transform: Affine2,

    // ====== 计时（毫秒） ======
    elapsed_time: f64,
    /// 上次内部更新以来累计的时间，渲染时消费
    delta_time: f64,

    // ====== 过渡 ======
    pub(super) visual_transition: TransitionSlot<VisualProperty>,
    pub(super) parameter_transition: TransitionSlot<String>,
    pub(super) focus_transition: TransitionSlot<Axis>,
    pub(super) wind_transition: TransitionSlot<Axis>,
    pub(super) parameter_overlay: Rc<RefCell<ParameterOverlay>>,
    overlay_hook: Option<HookId>,

    // ====== 音频 ======
    pub(super) audio: Option<AudioAnalyzer>,
    pub(super) speech: Option<SpeechSession>,

    // ====== 纹理 / 渲染 ======
    textures: Vec<Rc<Texture>>,
    texture_urls: Vec<String>,
    /// 当前上下文中的句柄，上下文变化后全部失效
    gpu_textures: Vec<Option<GlTextureId>>,
    texture_cache: Option<SharedTextureCache>,
    renderer: Option<SharedRenderer>,
    gl_context_id: Option<u64>,

    events: Vec<ModelEvent>,
    auto_transition_fired: bool,
}

impl Live2DModel {
    /// 创建未就绪的模型，之后用 `set_internal_model` 装入
    pub fn new(options: Live2DModelOptions) -> Self {
        Self {
            internal: None,
            options,
            tag: "Live2DModel(uninitialized)".to_string(),
            alpha: 1.0,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            pivot: Vec2::ZERO,
            anchor: Vec2::ZERO,
            parent_transform: Affine2::IDENTITY,
            elapsed_time: 0.0,
            delta_time: 0.0,
            visual_transition: TransitionSlot::new(DelayBehavior::Hold),
            parameter_transition: TransitionSlot::new(DelayBehavior::ReportFrom),
            focus_transition: TransitionSlot::new(DelayBehavior::ReportFrom),
            wind_transition: TransitionSlot::new(DelayBehavior::ReportFrom),
            parameter_overlay: Rc::new(RefCell::new(ParameterOverlay::default())),
            overlay_hook: None,
            audio: None,
            speech: None,
            textures: Vec::new(),
            texture_urls: Vec::new(),
            gpu_textures: Vec::new(),
            texture_cache: None,
            renderer: None,
            gl_context_id: None,
            events: Vec::new(),
            auto_transition_fired: false,
        }
    }

    pub fn from_loaded(loaded: LoadedModel, options: Live2DModelOptions) -> Self {
        let mut model = Self::new(options);
        model.set_internal_model(loaded.internal_model, loaded.textures, loaded.texture_urls);
        model
    }

    /// 通过工厂加载，失败时不创建任何对象
    pub fn load(factory: &Live2DFactory, url: &str, options: Live2DModelOptions) -> Result<Self> {
        let loaded = factory.load(url, &options.internal)?;
        let mut model = Self::new(options);
        model.texture_cache = factory.texture_cache().cloned();
        model.set_internal_model(loaded.internal_model, loaded.textures, loaded.texture_urls);
        Ok(model)
    }

    /// 整体替换内部模型；旧模型被销毁，进行中的过渡被停止
    pub fn set_internal_model(
        &mut self,
        mut internal: Box<dyn InternalModel>,
        textures: Vec<Rc<Texture>>,
        texture_urls: Vec<String>,
    ) {
        self.stop_all_transitions();
        self.stop_speaking();
        self.release_gpu_textures();
        if let Some(mut old) = self.internal.take() {
            old.destroy();
        }

        self.tag = format!("Live2DModel({})", internal.settings().name);
        self.overlay_hook = internal.add_hook(
            ModelHook::BeforeModelUpdate,
            parameter_overlay_hook(self.parameter_overlay.clone()),
        );

        self.gpu_textures = vec![None; textures.len()];
        self.textures = textures;
        self.texture_urls = texture_urls;
        self.gl_context_id = None;
        self.internal = Some(internal);
        self.update_pivot();

        log::info!("{} ready", self.tag);
        self.emit(ModelEvent::Ready);
        if !self.textures.is_empty() {
            self.emit(ModelEvent::Load);
        }
    }

    pub fn set_renderer(&mut self, renderer: SharedRenderer) {
        self.renderer = Some(renderer);
    }

    pub fn set_texture_cache(&mut self, cache: SharedTextureCache) {
        self.texture_cache = Some(cache);
    }

    /// 注入音频后端，替换时销毁旧的分析器
    pub fn set_audio_backend(&mut self, backend: Box<dyn AudioBackend>) {
        self.stop_speaking();
        if let Some(mut old) = self.audio.take() {
            old.destroy();
        }
        self.audio = Some(AudioAnalyzer::new(backend));
    }

    pub fn is_ready(&self) -> bool {
        self.internal.is_some()
    }

    pub fn internal_model(&self) -> Option<&dyn InternalModel> {
        self.internal.as_deref()
    }

    pub fn internal_model_mut(&mut self) -> Option<&mut (dyn InternalModel + 'static)> {
        self.internal.as_deref_mut()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn textures(&self) -> &[Rc<Texture>] {
        &self.textures
    }

    pub fn texture_urls(&self) -> &[String] {
        &self.texture_urls
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    // ========== 事件 ==========

    /// 取走积压的事件
    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    /// 宿主把模型加入场景后调用
    pub fn on_added(&mut self) {
        self.emit(ModelEvent::Added);
    }

    pub(super) fn emit(&mut self, event: ModelEvent) {
        let trigger = match event {
            ModelEvent::Ready => Some(AutoTransitionTrigger::Ready),
            ModelEvent::Load => Some(AutoTransitionTrigger::Load),
            ModelEvent::Added => Some(AutoTransitionTrigger::Added),
            _ => None,
        };
        self.events.push(event);

        if trigger.is_some() && trigger == self.options.auto_transition && !self.auto_transition_fired {
            self.auto_transition_fired = true;
            self.appear(None);
        }
    }

    // ========== 帧驱动 ==========

    /// 推进过渡和口型，累计时间；不触碰内部模型的模拟
    pub fn update(&mut self, dt: f64) {
        self.update_visual_transition(dt);
        self.update_parameter_transition(dt);
        self.update_focus_transition(dt);
        self.update_wind_transition(dt);
        self.update_speech();

        self.delta_time += dt;
        self.elapsed_time += dt;
    }

    /// 渲染回调
    ///
    /// 需要渲染器、已就绪的模型和纹理；出错时记录日志并跳过这一帧。
    pub fn render(&mut self) {
        let Some(renderer) = self.renderer.clone() else {
            return;
        };
        if !self.is_ready() || self.textures.is_empty() {
            return;
        }
        let mut renderer = renderer.borrow_mut();
        if let Err(e) = self.render_frame(&mut *renderer) {
            log::error!("{} render failed: {}", self.tag, e);
        }
    }

    fn render_frame(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let world = self.world_transform();
        let internal = self
            .internal
            .as_mut()
            .ok_or_else(|| Live2dError::Context("model is not ready".into()))?;

        // 上下文变化：重建 GPU 资源并强制重新上传纹理
        let context_id = renderer.context_uid();
        let context_changed = self.gl_context_id != Some(context_id);
        if context_changed {
            self.gl_context_id = Some(context_id);
            internal.update_webgl_context(renderer.gl(), context_id);
            self.gpu_textures.iter_mut().for_each(|t| *t = None);
            log::debug!("{} context changed: {}", self.tag, context_id);
        }

        // 有纹理待上传时（上下文变化或上次上传失败）先设置翻转，绑定后无论成败都复位
        let gc_count = renderer.texture_gc_count();
        let needs_upload = self.gpu_textures.iter().any(Option::is_none);
        if needs_upload {
            renderer.gl().pixel_store_flip_y(internal.texture_flip_y());
        }
        let mut bind_textures = || -> Result<()> {
            for (i, texture) in self.textures.iter().enumerate() {
                let handle = match self.gpu_textures[i] {
                    Some(handle) => handle,
                    None => {
                        let handle = renderer.gl().upload_texture(texture)?;
                        self.gpu_textures[i] = Some(handle);
                        handle
                    }
                };
                internal.bind_texture(i, handle);

                if let (Some(cache), Some(url)) = (&self.texture_cache, self.texture_urls.get(i)) {
                    cache.borrow_mut().touch(url, gc_count);
                }
            }
            Ok(())
        };
        let bound = bind_textures();
        if needs_upload {
            renderer.gl().pixel_store_flip_y(false);
        }
        bound?;

        let (width, height) = renderer.screen_size().unwrap_or(FALLBACK_SCREEN_SIZE);
        let viewport = [0.0, 0.0, width, height];
        renderer.gl().viewport(viewport);
        internal.base_mut().viewport = viewport;

        // 同一次更新可能渲染多次，只在时间前进后更新
        if self.delta_time != 0.0 {
            internal.update(self.delta_time, self.elapsed_time);
            self.delta_time = 0.0;
        }

        let projection = renderer
            .projection()
            .unwrap_or_else(|| screen_projection(width, height));
        internal.update_transform(&(projection * world));
        internal.draw(renderer.gl())
    }

    // ========== 变换 ==========

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.scale = Vec2::new(x, y);
    }

    pub fn pivot(&self) -> Vec2 {
        self.pivot
    }

    pub fn set_pivot(&mut self, x: f32, y: f32) {
        self.pivot = Vec2::new(x, y);
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    /// 锚点按内部模型尺寸换算成 pivot
    pub fn set_anchor(&mut self, x: f32, y: f32) {
        self.anchor = Vec2::new(x, y);
        self.update_pivot();
    }

    fn update_pivot(&mut self) {
        if let Some(internal) = &self.internal {
            self.pivot = self.anchor * Vec2::new(internal.width(), internal.height());
        }
    }

    /// 父节点的世界变换
    pub fn set_parent_transform(&mut self, transform: Affine2) {
        self.parent_transform = transform;
    }

    pub fn local_transform(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
            * Affine2::from_translation(-self.pivot)
    }

    pub fn world_transform(&self) -> Affine2 {
        self.parent_transform * self.local_transform()
    }

    /// 缩放后的宽度
    pub fn width(&self) -> f32 {
        self.internal.as_ref().map_or(0.0, |m| m.width() * self.scale.x)
    }

    pub fn height(&self) -> f32 {
        self.internal.as_ref().map_or(0.0, |m| m.height() * self.scale.y)
    }

    /// 世界空间的包围盒
    pub fn bounds(&self) -> Option<Bounds> {
        let internal = self.internal.as_ref()?;
        let world = self.world_transform();
        let (w, h) = (internal.width(), internal.height());
        let corners = [Vec2::ZERO, Vec2::new(w, 0.0), Vec2::new(0.0, h), Vec2::new(w, h)];
        let flat: Vec<f32> = corners
            .iter()
            .flat_map(|c| world.transform_point2(*c).to_array())
            .collect();
        Bounds::from_vertices(&flat)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.bounds().map_or(false, |b| b.contains(x, y))
    }

    /// 世界坐标 → 未缩放模型画布的像素坐标
    pub fn to_model_position(&self, x: f32, y: f32) -> Option<Vec2> {
        let internal = self.internal.as_ref()?;
        let local = self.world_transform().inverse().transform_point2(Vec2::new(x, y));
        Some(internal.local_transform().inverse().transform_point2(local))
    }

    // ========== 动作 / 表情 ==========

    /// `index` 为 None 时随机播放
    pub fn motion(&mut self, group: &str, index: Option<usize>, priority: Option<MotionPriority>) -> bool {
        let Some(internal) = self.internal.as_mut() else {
            return false;
        };
        let priority = priority.unwrap_or_default();
        match index {
            Some(index) => internal.start_motion(group, index, priority),
            None => internal.start_random_motion(group, priority),
        }
    }

    /// `id` 为 None 时随机表情
    pub fn expression(&mut self, id: Option<ExpressionId<'_>>) -> bool {
        let Some(internal) = self.internal.as_mut() else {
            return false;
        };
        match id {
            Some(id) => internal.set_expression(id),
            None => internal.set_random_expression(),
        }
    }

    // ========== 点击 ==========

    /// 世界坐标下命中的点击区域名称
    pub fn hit_test(&self, x: f32, y: f32) -> Vec<String> {
        match (self.internal.as_ref(), self.to_model_position(x, y)) {
            (Some(internal), Some(p)) => internal.hit_test(p.x, p.y),
            _ => Vec::new(),
        }
    }

    /// 点击测试，命中时发出 `Hit`
    pub fn tap(&mut self, x: f32, y: f32) -> Vec<String> {
        let names = self.hit_test(x, y);
        if !names.is_empty() {
            log::debug!("{} Hit {:?}", self.tag, names);
            self.emit(ModelEvent::Hit(names.clone()));
        }
        names
    }

    // ========== 参数 ==========

    pub fn parameter_value(&self, id: &str) -> Option<f32> {
        self.internal.as_ref()?.parameter_value(id)
    }

    pub fn set_parameter_value(&mut self, id: &str, value: f32) -> bool {
        match self.internal.as_mut() {
            Some(internal) => internal.set_parameter_value(id, value),
            None => false,
        }
    }

    /// 返回成功写入的参数个数
    pub fn set_parameter_values<'a>(&mut self, values: impl IntoIterator<Item = (&'a str, f32)>) -> usize {
        values
            .into_iter()
            .filter(|(id, value)| self.set_parameter_value(id, *value))
            .count()
    }

    // ========== 开关 ==========

    pub fn start_lip_sync(&mut self) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_lip_sync_enabled(true);
        }
    }

    pub fn stop_lip_sync(&mut self) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_lip_sync_enabled(false);
            internal.set_lip_sync_value(0.0);
        }
    }

    pub fn is_lip_sync_enabled(&self) -> bool {
        self.internal.as_ref().map_or(false, |m| m.is_lip_sync_enabled())
    }

    pub fn lip_sync_value(&self) -> f32 {
        self.internal.as_ref().map_or(0.0, |m| m.lip_sync_value())
    }

    pub fn set_lip_sync_value(&mut self, value: f32) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_lip_sync_value(value);
        }
    }

    pub fn is_eye_blink_enabled(&self) -> bool {
        self.internal.as_ref().map_or(true, |m| m.is_eye_blink_enabled())
    }

    pub fn set_eye_blink_enabled(&mut self, enabled: bool) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_eye_blink_enabled(enabled);
        }
    }

    pub fn is_breath_enabled(&self) -> bool {
        self.internal.as_ref().map_or(true, |m| m.is_breath_enabled())
    }

    pub fn set_breath_enabled(&mut self, enabled: bool) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_breath_enabled(enabled);
        }
    }

    pub fn eyes_always_look_at_camera(&self) -> bool {
        self.internal.as_ref().map_or(false, |m| m.eyes_always_look_at_camera())
    }

    pub fn set_eyes_always_look_at_camera(&mut self, locked: bool) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_eyes_always_look_at_camera(locked);
        }
    }

    pub fn set_breath_parameters(&mut self, parameters: &[BreathParameter]) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_breath_parameters(parameters);
        }
    }

    pub fn set_breath_intensity(&mut self, intensity: f32) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_breath_intensity(intensity);
        }
    }

    pub fn set_breath_cycle(&mut self, cycle: f32) {
        if let Some(internal) = self.internal.as_mut() {
            internal.set_breath_cycle(cycle);
        }
    }

    // ========== 销毁 ==========

    /// 停止全部过渡（resolve，不应用目标值）后释放纹理、音频和内部模型
    pub fn destroy(&mut self, options: DestroyOptions) {
        self.stop_all_transitions();
        self.stop_speaking();
        if let (Some(internal), Some(hook)) = (self.internal.as_mut(), self.overlay_hook.take()) {
            internal.remove_hook(hook);
        }
        self.emit(ModelEvent::Destroy);

        if options.textures || options.texture_source {
            if options.texture_source {
                self.unload_texture_sources();
            }
            self.release_gpu_textures();
            self.textures.clear();
            self.texture_urls.clear();
            self.gpu_textures.clear();
        }

        if let Some(mut audio) = self.audio.take() {
            audio.destroy();
        }
        if let Some(mut internal) = self.internal.take() {
            internal.destroy();
        }
        self.parameter_overlay.borrow_mut().clear();
        log::info!("{} destroyed", self.tag);
    }

    fn unload_texture_sources(&mut self) {
        let Some(cache) = &self.texture_cache else {
            return;
        };
        let cached: Vec<String> = {
            let cache = cache.borrow();
            self.texture_urls.iter().filter(|url| cache.contains(url)).cloned().collect()
        };
        if cached.is_empty() {
            return;
        }
        if let Err(e) = cache.borrow_mut().unload(&cached) {
            log::warn!("{} Failed to unload textures: {}", self.tag, e);
        }
    }

    /// 删除当前上下文中的纹理句柄
    fn release_gpu_textures(&mut self) {
        let handles: Vec<GlTextureId> = self.gpu_textures.iter_mut().filter_map(Option::take).collect();
        if handles.is_empty() {
            return;
        }
        if let Some(renderer) = &self.renderer {
            let mut renderer = renderer.borrow_mut();
            for handle in handles {
                renderer.gl().delete_texture(handle);
            }
        }
    }
}

impl Drop for Live2DModel {
    fn drop(&mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.destroy();
        }
    }
}
