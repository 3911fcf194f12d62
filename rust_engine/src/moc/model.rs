//! 核心模型运行时
//!
//! 参数表 + 部件不透明度 + 可绘制对象顶点缓存。
//! 每帧由内部模型写参数，`update()` 提交后重建顶点缓存。

use std::collections::HashMap;

use rayon::prelude::*;

use super::data::{CanvasInfo, DrawableData, MocData};
use super::deform::deform_drawable;
use crate::Result;

/// 核心模型
pub struct CoreModel {
    canvas: CanvasInfo,
    drawables: Vec<DrawableData>,

    // 参数
    parameter_ids: Vec<String>,
    parameter_min: Vec<f32>,
    parameter_max: Vec<f32>,
    parameter_defaults: Vec<f32>,
    parameter_values: Vec<f32>,
    saved_parameters: Vec<f32>,
    parameter_index: HashMap<String, usize>,

    // 部件
    part_ids: Vec<String>,
    part_parents: Vec<Option<usize>>,
    part_opacities: Vec<f32>,
    part_index: HashMap<String, usize>,

    // 可绘制对象
    drawable_index: HashMap<String, usize>,
    drawable_parts: Vec<Option<usize>>,
    vertex_cache: Vec<Vec<f32>>,
    drawable_opacities: Vec<f32>,
    render_orders: Vec<i32>,
}

impl CoreModel {
    pub fn new(data: MocData) -> Self {
        let MocData {
            canvas,
            parameters,
            parts,
            drawables,
        } = data;

        let parameter_index = parameters
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        let part_index: HashMap<String, usize> = parts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        let part_parents = parts
            .iter()
            .map(|p| p.parent.as_ref().and_then(|id| part_index.get(id).copied()))
            .collect();
        let drawable_index = drawables
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        let drawable_parts = drawables
            .iter()
            .map(|d| d.parent_part.as_ref().and_then(|id| part_index.get(id).copied()))
            .collect();
        let render_orders = drawables
            .iter()
            .enumerate()
            .map(|(i, d)| d.render_order.unwrap_or(i as i32))
            .collect();
        let defaults: Vec<f32> = parameters
            .iter()
            .map(|p| p.default.max(p.min).min(p.max))
            .collect();

        let mut model = Self {
            canvas,
            parameter_ids: parameters.iter().map(|p| p.id.clone()).collect(),
            parameter_min: parameters.iter().map(|p| p.min).collect(),
            parameter_max: parameters.iter().map(|p| p.max).collect(),
            parameter_values: defaults.clone(),
            saved_parameters: defaults.clone(),
            parameter_defaults: defaults,
            parameter_index,
            part_ids: parts.iter().map(|p| p.id.clone()).collect(),
            part_parents,
            part_opacities: parts.iter().map(|p| p.opacity).collect(),
            part_index,
            drawable_index,
            drawable_parts,
            vertex_cache: drawables.iter().map(|d| d.vertices.clone()).collect(),
            drawable_opacities: drawables.iter().map(|d| d.opacity).collect(),
            render_orders,
            drawables,
        };
        model.update();
        model
    }

    /// 从字节解析
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(MocData::from_slice(bytes)?))
    }

    // ========== 画布 ==========

    pub fn canvas_width(&self) -> f32 {
        self.canvas.width
    }

    pub fn canvas_height(&self) -> f32 {
        self.canvas.height
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.canvas.pixels_per_unit
    }

    // ========== 参数 ==========

    pub fn parameter_count(&self) -> usize {
        self.parameter_values.len()
    }

    pub fn parameter_ids(&self) -> &[String] {
        &self.parameter_ids
    }

    pub fn parameter_index(&self, id: &str) -> Option<usize> {
        self.parameter_index.get(id).copied()
    }

    /// 越界返回 0
    pub fn parameter_value(&self, index: usize) -> f32 {
        self.parameter_values.get(index).copied().unwrap_or(0.0)
    }

    pub fn parameter_value_by_id(&self, id: &str) -> Option<f32> {
        self.parameter_index(id).map(|i| self.parameter_values[i])
    }

    pub fn parameter_default(&self, index: usize) -> f32 {
        self.parameter_defaults.get(index).copied().unwrap_or(0.0)
    }

    pub fn parameter_range(&self, index: usize) -> Option<(f32, f32)> {
        Some((*self.parameter_min.get(index)?, *self.parameter_max.get(index)?))
    }

    fn write_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.parameter_values.get_mut(index) {
            if value.is_finite() {
                *slot = value.max(self.parameter_min[index]).min(self.parameter_max[index]);
            }
        }
    }

    /// 按权重设置：`cur * (1 - w) + v * w`
    pub fn set_parameter_value(&mut self, index: usize, value: f32, weight: f32) {
        let next = if weight == 1.0 {
            value
        } else {
            let current = self.parameter_value(index);
            current * (1.0 - weight) + value * weight
        };
        self.write_parameter(index, next);
    }

    /// 叠加：`cur + v * w`
    pub fn add_parameter_value(&mut self, index: usize, value: f32, weight: f32) {
        let next = self.parameter_value(index) + value * weight;
        self.write_parameter(index, next);
    }

    /// 乘算：`cur * (1 + (v - 1) * w)`
    pub fn multiply_parameter_value(&mut self, index: usize, value: f32, weight: f32) {
        let next = self.parameter_value(index) * (1.0 + (value - 1.0) * weight);
        self.write_parameter(index, next);
    }

    pub fn set_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) -> bool {
        match self.parameter_index(id) {
            Some(index) => {
                self.set_parameter_value(index, value, weight);
                true
            }
            None => false,
        }
    }

    pub fn add_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) -> bool {
        match self.parameter_index(id) {
            Some(index) => {
                self.add_parameter_value(index, value, weight);
                true
            }
            None => false,
        }
    }

    pub fn multiply_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) -> bool {
        match self.parameter_index(id) {
            Some(index) => {
                self.multiply_parameter_value(index, value, weight);
                true
            }
            None => false,
        }
    }

    /// 保存参数快照
    pub fn save_parameters(&mut self) {
        self.saved_parameters.copy_from_slice(&self.parameter_values);
    }

    /// 恢复参数快照
    pub fn load_parameters(&mut self) {
        self.parameter_values.copy_from_slice(&self.saved_parameters);
    }

    // ========== 部件 ==========

    pub fn part_count(&self) -> usize {
        self.part_opacities.len()
    }

    pub fn part_ids(&self) -> &[String] {
        &self.part_ids
    }

    pub fn part_index(&self, id: &str) -> Option<usize> {
        self.part_index.get(id).copied()
    }

    pub fn part_opacity(&self, index: usize) -> f32 {
        self.part_opacities.get(index).copied().unwrap_or(0.0)
    }

    pub fn set_part_opacity(&mut self, index: usize, opacity: f32) {
        if let Some(slot) = self.part_opacities.get_mut(index) {
            *slot = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn set_part_opacity_by_id(&mut self, id: &str, opacity: f32) -> bool {
        match self.part_index(id) {
            Some(index) => {
                self.set_part_opacity(index, opacity);
                true
            }
            None => false,
        }
    }

    /// 沿父链累乘后的部件不透明度
    fn effective_part_opacities(&self) -> Vec<f32> {
        (0..self.part_opacities.len())
            .map(|mut index| {
                let mut opacity = self.part_opacities[index];
                let mut depth = 0;
                while let Some(parent) = self.part_parents[index] {
                    opacity *= self.part_opacities[parent];
                    index = parent;
                    depth += 1;
                    // 父链成环时截断
                    if depth > self.part_opacities.len() {
                        break;
                    }
                }
                opacity
            })
            .collect()
    }

    // ========== 可绘制对象 ==========

    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    pub fn drawable_ids(&self) -> Vec<String> {
        self.drawables.iter().map(|d| d.id.clone()).collect()
    }

    pub fn drawable_index(&self, id: &str) -> Option<usize> {
        self.drawable_index.get(id).copied()
    }

    pub fn drawable(&self, index: usize) -> Option<&DrawableData> {
        self.drawables.get(index)
    }

    /// 最近一次提交后的顶点（模型单位）
    pub fn drawable_vertices(&self, index: usize) -> Option<&[f32]> {
        self.vertex_cache.get(index).map(|v| v.as_slice())
    }

    pub fn drawable_opacity(&self, index: usize) -> f32 {
        self.drawable_opacities.get(index).copied().unwrap_or(0.0)
    }

    pub fn render_order(&self, index: usize) -> i32 {
        self.render_orders.get(index).copied().unwrap_or(0)
    }

    /// 按绘制顺序排列的下标
    pub fn sorted_drawable_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.drawables.len()).collect();
        indices.sort_by_key(|&i| self.render_orders[i]);
        indices
    }

    /// 提交参数：并行重建顶点缓存和不透明度
    pub fn update(&mut self) {
        let part_opacities = self.effective_part_opacities();
        let values = &self.parameter_values;
        let index = &self.parameter_index;
        let lookup = |id: &str| index.get(id).map(|&i| values[i]);

        self.vertex_cache
            .par_iter_mut()
            .zip(self.drawable_opacities.par_iter_mut())
            .zip(self.drawables.par_iter())
            .zip(self.drawable_parts.par_iter())
            .for_each(|(((vertices, opacity), drawable), part)| {
                let deformed = deform_drawable(drawable, lookup, vertices);
                let part_opacity = part.map(|p| part_opacities[p]).unwrap_or(1.0);
                *opacity = (drawable.opacity * deformed * part_opacity).clamp(0.0, 1.0);
            });
    }
}
