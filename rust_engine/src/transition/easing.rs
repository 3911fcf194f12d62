//! 缓动函数

use std::fmt;
use std::rc::Rc;

/// 缓动函数（预设或自定义）
#[derive(Clone, Default)]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    /// 自定义函数，输入输出均为进度
    Custom(Rc<dyn Fn(f32) -> f32>),
}

impl Easing {
    pub fn custom(f: impl Fn(f32) -> f32 + 'static) -> Self {
        Easing::Custom(Rc::new(f))
    }

    /// 按预设名查找，未知名称回退为线性
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear" => Easing::Linear,
            "easeInQuad" => Easing::EaseInQuad,
            "easeOutQuad" => Easing::EaseOutQuad,
            "easeInOutQuad" => Easing::EaseInOutQuad,
            "easeInCubic" => Easing::EaseInCubic,
            "easeOutCubic" => Easing::EaseOutCubic,
            _ => Easing::Linear,
        }
    }

    pub fn apply(&self, p: f32) -> f32 {
        match self {
            Easing::Linear => p,
            Easing::EaseInQuad => p * p,
            Easing::EaseOutQuad => p * (2.0 - p),
            Easing::EaseInOutQuad => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    -1.0 + (4.0 - 2.0 * p) * p
                }
            }
            Easing::EaseInCubic => p * p * p,
            Easing::EaseOutCubic => 1.0 - (1.0 - p).powi(3),
            Easing::Custom(f) => f(p),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseInQuad => "easeInQuad",
            Easing::EaseOutQuad => "easeOutQuad",
            Easing::EaseInOutQuad => "easeInOutQuad",
            Easing::EaseInCubic => "easeInCubic",
            Easing::EaseOutCubic => "easeOutCubic",
            Easing::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Easing({})", self.name())
    }
}

impl From<&str> for Easing {
    fn from(name: &str) -> Self {
        Easing::from_name(name)
    }
}
