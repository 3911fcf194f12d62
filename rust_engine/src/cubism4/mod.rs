//! Cubism 4 格式
//!
//! - motion3.json / exp3.json / physics3.json / pose3.json 解析
//! - `Cubism4InternalModel`：秒计时、像素中心变换、支持风的物理

mod expression;
mod internal_model;
mod motion3;
mod physics;
mod pose;

pub use expression::{Expression3, ExpressionBlend};
pub use internal_model::{default_breath_parameters, Cubism4InternalModel};
pub use motion3::{CurveTarget, Motion3};
pub use physics::Physics3;
pub use pose::parse_pose3;
