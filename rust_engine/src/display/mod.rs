//! 场景对象
//!
//! `Live2DModel` 包装一个内部模型：渲染回调、纹理绑定、过渡调度、
//! 点击测试、音频口型和销毁。宿主每帧调用 `update(dt)` 与 `render()`，
//! 生命周期事件由 `take_events()` 取走。

mod hit_area_frames;
mod live2d_model;
mod speech;
mod transitions;

pub use hit_area_frames::{HitAreaFrame, HitAreaFrames, HIT_AREA_ACTIVE_COLOR, HIT_AREA_NORMAL_COLOR};
pub use live2d_model::Live2DModel;

use crate::model::InternalModelOptions;
use crate::motion::ExpressionId;
use crate::transition::{TransitionOptions, TransitionTiming};
use crate::Live2dError;

/// 可过渡的可见属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualProperty {
    Alpha,
    X,
    Y,
    /// 弧度
    Rotation,
    ScaleX,
    ScaleY,
}

/// 焦点 / 风向量的分量
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    X,
    Y,
}

/// 出现 / 消失的预设，合并在默认值之上
#[derive(Debug, Clone, Default)]
pub struct TransitionPresets {
    pub appear: Option<TransitionOptions<VisualProperty>>,
    pub disappear: Option<TransitionOptions<VisualProperty>>,
}

/// 自动出现过渡的触发时机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTransitionTrigger {
    Ready,
    Load,
    Added,
}

#[derive(Debug, Clone, Default)]
pub struct Live2DModelOptions {
    pub transitions: TransitionPresets,
    /// 为 None 时不自动出现
    pub auto_transition: Option<AutoTransitionTrigger>,
    pub internal: InternalModelOptions,
}

/// 生命周期事件
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// 内部模型已就绪
    Ready,
    /// 纹理已就绪
    Load,
    /// 已加入场景
    Added,
    /// 点击命中的区域名称
    Hit(Vec<String>),
    Destroy,
}

/// 按下标或名称指定表情（持有所有权）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionTarget {
    Index(usize),
    Name(String),
}

impl ExpressionTarget {
    pub fn as_id(&self) -> ExpressionId<'_> {
        match self {
            ExpressionTarget::Index(i) => ExpressionId::Index(*i),
            ExpressionTarget::Name(name) => ExpressionId::Name(name),
        }
    }
}

impl From<usize> for ExpressionTarget {
    fn from(index: usize) -> Self {
        ExpressionTarget::Index(index)
    }
}

impl From<&str> for ExpressionTarget {
    fn from(name: &str) -> Self {
        ExpressionTarget::Name(name.to_string())
    }
}

/// `look_to` / `look_at` 的选项
#[derive(Debug, Clone, Default)]
pub struct FocusOptions {
    /// 未指定任何时间参数时交给焦点控制器平滑跟随
    pub timing: TransitionTiming,
    /// 跳过焦点控制器的平滑
    pub instant: bool,
}

impl FocusOptions {
    pub fn instant() -> Self {
        Self {
            timing: TransitionTiming::default(),
            instant: true,
        }
    }

    pub fn with_timing(timing: TransitionTiming) -> Self {
        Self { timing, instant: false }
    }
}

/// `speak` 的选项
pub struct SpeakOptions {
    /// 音量倍率，结果钳制到 1
    pub volume: f32,
    /// 说话时切换的表情
    pub expression: Option<ExpressionTarget>,
    /// 结束后恢复默认表情
    pub reset_expression: bool,
    pub on_finish: Option<Box<dyn FnOnce()>>,
    pub on_error: Option<Box<dyn FnOnce(&Live2dError)>>,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            volume: 1.0,
            expression: None,
            reset_expression: true,
            on_finish: None,
            on_error: None,
        }
    }
}

impl SpeakOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_expression(mut self, expression: impl Into<ExpressionTarget>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn on_finish(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(&Live2dError) + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for SpeakOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakOptions")
            .field("volume", &self.volume)
            .field("expression", &self.expression)
            .field("reset_expression", &self.reset_expression)
            .finish()
    }
}

/// `destroy` 的选项
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyOptions {
    /// 释放纹理的 GPU 句柄
    pub textures: bool,
    /// 同时从共享缓存卸载纹理源
    pub texture_source: bool,
}
