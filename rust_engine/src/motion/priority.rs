//! 动作优先级

/// 动作优先级，高优先级可以打断低优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MotionPriority {
    /// 不播放
    None = 0,
    /// 待机动作
    Idle = 1,
    #[default]
    Normal = 2,
    /// 强制播放，总是打断当前动作
    Force = 3,
}
