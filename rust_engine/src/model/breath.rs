//! 呼吸
//!
//! `value = offset + peak * intensity * sin(2π·t / (cycle * cycle_scale))`，再乘权重。
//! 标准呼吸参数直接设置，其余参数叠加。

use std::f32::consts::PI;

use crate::moc::CoreModel;

/// 最小周期（秒）
const MIN_CYCLE: f32 = 0.001;

/// 呼吸参数
#[derive(Debug, Clone, PartialEq)]
pub struct BreathParameter {
    pub parameter_id: String,
    pub offset: f32,
    pub peak: f32,
    /// 周期（秒）
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    pub fn new(parameter_id: impl Into<String>, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            parameter_id: parameter_id.into(),
            offset,
            peak,
            cycle,
            weight,
        }
    }

    /// 非有限值归零 / 归一，周期不小于 MIN_CYCLE
    pub fn sanitized(&self) -> Self {
        Self {
            parameter_id: self.parameter_id.clone(),
            offset: if self.offset.is_finite() { self.offset } else { 0.0 },
            peak: if self.peak.is_finite() { self.peak } else { 0.0 },
            cycle: if self.cycle.is_finite() { self.cycle.max(MIN_CYCLE) } else { MIN_CYCLE },
            weight: if self.weight.is_finite() { self.weight } else { 1.0 },
        }
    }
}

/// 解析后的条目
#[derive(Debug, Clone)]
struct BreathEntry {
    index: usize,
    offset: f32,
    peak: f32,
    cycle: f32,
    weight: f32,
}

/// 呼吸模拟
#[derive(Debug, Clone)]
pub struct Breath {
    base: Vec<(BreathParameter, Option<usize>)>,
    intensity: f32,
    cycle_scale: f32,
    /// 每次重新配置后重新生成
    entries: Vec<BreathEntry>,
    /// 标准呼吸参数下标
    canonical: Option<usize>,
}

impl Breath {
    pub fn new(canonical: Option<usize>) -> Self {
        Self {
            base: Vec::new(),
            intensity: 1.0,
            cycle_scale: 1.0,
            entries: Vec::new(),
            canonical,
        }
    }

    /// 设置参数列表；模型中不存在的参数被忽略
    pub fn set_parameters(&mut self, core: &CoreModel, parameters: &[BreathParameter]) {
        self.base = parameters
            .iter()
            .map(|p| {
                let p = p.sanitized();
                let index = core.parameter_index(&p.parameter_id);
                (p, index)
            })
            .collect();
        self.regenerate();
    }

    /// 非有限值回退为 1，负数钳制为 0
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = if intensity.is_finite() { intensity.max(0.0) } else { 1.0 };
        self.regenerate();
    }

    /// 非有限值回退为 1，不小于 MIN_CYCLE
    pub fn set_cycle_scale(&mut self, cycle: f32) {
        self.cycle_scale = if cycle.is_finite() { cycle.max(MIN_CYCLE) } else { 1.0 };
        self.regenerate();
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn cycle_scale(&self) -> f32 {
        self.cycle_scale
    }

    pub fn parameters(&self) -> Vec<BreathParameter> {
        self.base.iter().map(|(p, _)| p.clone()).collect()
    }

    fn regenerate(&mut self) {
        self.entries = self
            .base
            .iter()
            .filter_map(|(p, index)| {
                index.map(|index| BreathEntry {
                    index,
                    offset: p.offset,
                    peak: p.peak * self.intensity,
                    cycle: (p.cycle * self.cycle_scale).max(MIN_CYCLE),
                    weight: p.weight,
                })
            })
            .collect();
    }

    /// t 秒时各参数的加权值
    pub fn values_at(&self, t: f32) -> Vec<(usize, f32)> {
        self.entries
            .iter()
            .map(|e| {
                let value = e.offset + e.peak * (2.0 * PI * t / e.cycle).sin();
                (e.index, value * e.weight)
            })
            .collect()
    }

    /// 写入参数
    pub fn apply(&self, core: &mut CoreModel, t: f32) {
        for (index, value) in self.values_at(t) {
            if Some(index) == self.canonical {
                core.set_parameter_value(index, value, 1.0);
            } else {
                core.add_parameter_value(index, value, 1.0);
            }
        }
    }
}
