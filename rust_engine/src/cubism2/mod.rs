//! Cubism 2 格式
//!
//! - .mtn 动作、表情、头发物理、姿势解析
//! - `Cubism2InternalModel`：毫秒计时、缓存参数下标、绘制前不可点击

mod expression;
mod internal_model;
mod mtn;
mod physics;
mod pose;

pub use expression::Expression2;
pub use internal_model::{default_breath_parameters, Cubism2InternalModel};
pub use mtn::{MtnMotion, MtnTarget};
pub use physics::{parse_physics2, physics2_rig};
pub use pose::{parse_pose2, POSE2_FADE_TIME};
