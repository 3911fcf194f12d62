//! Live2D Engine - Rust 实现的 Live2D 模型运行时
//!
//! 提供的运行时功能：
//! - Cubism 2 / Cubism 4 两种内部模型（统一的 `InternalModel` trait）
//! - 动作、表情、眨眼、呼吸、物理、姿势模拟
//! - 可见属性 / 参数 / 焦点 / 风的过渡调度
//! - 纹理绑定与 GL 上下文丢失后的重建
//! - 音频驱动的口型同步

pub mod audio;
pub mod config;
pub mod cubism2;
pub mod cubism4;
pub mod display;
pub mod factory;
pub mod gl;
pub mod moc;
pub mod model;
pub mod motion;
pub mod physics;
pub mod texture;
pub mod transition;

#[cfg(test)]
pub(crate) mod testing;

pub use cubism2::Cubism2InternalModel;
pub use cubism4::Cubism4InternalModel;
pub use display::{Live2DModel, Live2DModelOptions, ModelEvent};
pub use factory::{AssetSource, Live2DFactory, TextureCache};
pub use model::{InternalModel, ModelFormat, ModelSettings};
pub use motion::MotionPriority;
pub use texture::Texture;
pub use transition::{Completion, CompletionState, Easing, TransitionOptions, TransitionTiming};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Live2dError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Model data error: {0}")]
    ModelData(String),

    #[error("Motion error: {0}")]
    Motion(String),

    #[error("Texture error: {0}")]
    Texture(String),

    #[error("Unable to find drawable ID: {0}")]
    DrawableNotFound(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Render context error: {0}")]
    Context(String),
}

pub type Result<T> = std::result::Result<T, Live2dError>;
