//! 动作与表情系统
//!
//! 提供优先级、淡入淡出队列、动作组管理和表情管理。
//! 具体的动作格式（motion3.json / .mtn）和表情格式在各自的格式模块中实现 `MotionClip`。

mod bezier;
mod expression;
mod manager;
mod priority;
mod queue;

pub use bezier::BezierCurve;
pub use expression::{ExpressionId, ExpressionManager};
pub use manager::{MotionGroups, MotionManager};
pub use priority::MotionPriority;
pub use queue::{MotionClip, MotionEntryState, MotionQueue};
