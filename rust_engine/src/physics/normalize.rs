//! 参数归一化与方向换算

use glam::Vec2;

/// 归一化范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationRange {
    pub minimum: f32,
    pub default: f32,
    pub maximum: f32,
}

impl NormalizationRange {
    pub fn new(minimum: f32, default: f32, maximum: f32) -> Self {
        Self { minimum, default, maximum }
    }
}

impl Default for NormalizationRange {
    fn default() -> Self {
        Self::new(-10.0, 0.0, 10.0)
    }
}

/// 参数值 → 归一化值
///
/// 以参数范围中点为界，两侧分别线性映射到 [default, max] / [min, default]。
/// 未反射时结果取反。
pub fn normalize_parameter_value(
    value: f32,
    parameter_min: f32,
    parameter_max: f32,
    range: &NormalizationRange,
    reflect: bool,
) -> f32 {
    let max_value = parameter_max.max(parameter_min);
    let min_value = parameter_max.min(parameter_min);
    let value = value.max(min_value).min(max_value);

    let min_norm = range.minimum.min(range.maximum);
    let max_norm = range.minimum.max(range.maximum);
    let middle_norm = range.default;

    let middle_value = min_value + (max_value - min_value) / 2.0;
    let param_value = value - middle_value;

    let result = if param_value > 0.0 {
        let n_length = max_norm - middle_norm;
        let p_length = max_value - middle_value;
        if p_length != 0.0 {
            param_value * (n_length / p_length) + middle_norm
        } else {
            middle_norm
        }
    } else if param_value < 0.0 {
        let n_length = min_norm - middle_norm;
        let p_length = min_value - middle_value;
        if p_length != 0.0 {
            param_value * (n_length / p_length) + middle_norm
        } else {
            middle_norm
        }
    } else {
        middle_norm
    };

    if reflect {
        result
    } else {
        -result
    }
}

/// 弧度 → 方向 (sin, cos)
pub fn radian_to_direction(radian: f32) -> Vec2 {
    Vec2::new(radian.sin(), radian.cos())
}

/// from → to 的夹角，落在 [-π, π]
pub fn direction_to_radian(from: Vec2, to: Vec2) -> f32 {
    let q1 = to.y.atan2(to.x);
    let q2 = from.y.atan2(from.x);
    let mut ret = q1 - q2;

    while ret < -std::f32::consts::PI {
        ret += std::f32::consts::PI * 2.0;
    }
    while ret > std::f32::consts::PI {
        ret -= std::f32::consts::PI * 2.0;
    }
    ret
}
