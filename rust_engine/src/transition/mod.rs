//! 过渡调度 - 时间驱动的数值插值
//!
//! 对任意数值属性包做插值，不关心渲染：
//! - 每种过渡（可见属性、参数、焦点、风）各占一个 `TransitionSlot`
//! - 新过渡启动前先停止同类旧过渡（完成而不应用目标值）
//! - 完成信号由 `Completion` 观察（状态查询、回调或 `Future`）

mod completion;
mod easing;
mod scheduler;

pub use completion::{Completion, CompletionState};
pub use easing::Easing;
pub use scheduler::{
    lerp, DelayBehavior, StartedTransition, TransitionOptions, TransitionPoll, TransitionSlot,
    TransitionState, TransitionStatus, TransitionTiming, ValueMap,
};
