//! 核心模型数据文件
//!
//! 模型的画布、参数、部件和可绘制网格以 JSON 描述，
//! 每个可绘制对象带若干按参数关键帧插值的形变器。

use serde::Deserialize;

use crate::{Live2dError, Result};

fn one() -> f32 {
    1.0
}

fn default_draw_order() -> i32 {
    500
}

/// 画布信息
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasInfo {
    pub width: f32,
    pub height: f32,
    /// 模型单位到像素的比例
    #[serde(default = "one")]
    pub pixels_per_unit: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterData {
    pub id: String,
    #[serde(default)]
    pub min: f32,
    #[serde(default = "one")]
    pub max: f32,
    #[serde(default)]
    pub default: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartData {
    pub id: String,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default)]
    pub parent: Option<String>,
}

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiplicative,
}

/// 形变器：参数关键帧 → 顶点偏移 / 不透明度
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeformerData {
    pub parameter: String,
    /// 升序的参数关键值
    pub keys: Vec<f32>,
    /// 每个关键值对应一组顶点偏移（长度与顶点数组相同）
    #[serde(default)]
    pub offsets: Vec<Vec<f32>>,
    /// 每个关键值对应的不透明度系数
    #[serde(default)]
    pub opacities: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawableData {
    pub id: String,
    #[serde(default)]
    pub texture_index: usize,
    /// 平铺的 xy 坐标
    pub vertices: Vec<f32>,
    #[serde(default)]
    pub uvs: Vec<f32>,
    #[serde(default)]
    pub indices: Vec<u16>,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default = "default_draw_order")]
    pub draw_order: i32,
    /// 缺省时按声明顺序
    #[serde(default)]
    pub render_order: Option<i32>,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub blend: BlendMode,
    /// 作为遮罩的可绘制对象下标
    #[serde(default)]
    pub masks: Vec<usize>,
    #[serde(default)]
    pub inverted_mask: bool,
    #[serde(default)]
    pub parent_part: Option<String>,
    #[serde(default)]
    pub deformers: Vec<DeformerData>,
}

impl DrawableData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 2
    }
}

/// 模型数据根节点
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MocData {
    pub canvas: CanvasInfo,
    #[serde(default)]
    pub parameters: Vec<ParameterData>,
    #[serde(default)]
    pub parts: Vec<PartData>,
    #[serde(default)]
    pub drawables: Vec<DrawableData>,
}

impl MocData {
    /// 解析并校验
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let data: MocData = serde_json::from_slice(bytes)?;
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> Result<()> {
        if !(self.canvas.width > 0.0 && self.canvas.height > 0.0) {
            return Err(Live2dError::ModelData(format!(
                "invalid canvas size {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if !(self.canvas.pixels_per_unit > 0.0) {
            return Err(Live2dError::ModelData("pixelsPerUnit must be positive".into()));
        }

        for param in &self.parameters {
            if param.min > param.max {
                return Err(Live2dError::ModelData(format!(
                    "parameter {} has min > max",
                    param.id
                )));
            }
        }

        let drawable_count = self.drawables.len();
        for drawable in &self.drawables {
            let len = drawable.vertices.len();
            if len % 2 != 0 {
                return Err(Live2dError::ModelData(format!(
                    "drawable {} has an odd vertex array",
                    drawable.id
                )));
            }
            if !drawable.uvs.is_empty() && drawable.uvs.len() != len {
                return Err(Live2dError::ModelData(format!(
                    "drawable {} uv count mismatch",
                    drawable.id
                )));
            }
            let vertex_count = drawable.vertex_count();
            if drawable.indices.iter().any(|&i| i as usize >= vertex_count) {
                return Err(Live2dError::ModelData(format!(
                    "drawable {} index out of range",
                    drawable.id
                )));
            }
            if drawable.masks.iter().any(|&m| m >= drawable_count) {
                return Err(Live2dError::ModelData(format!(
                    "drawable {} references a missing mask",
                    drawable.id
                )));
            }
            for deformer in &drawable.deformers {
                if deformer.keys.is_empty() {
                    return Err(Live2dError::ModelData(format!(
                        "drawable {} has a deformer without keys",
                        drawable.id
                    )));
                }
                if deformer.keys.windows(2).any(|w| w[0] > w[1]) {
                    return Err(Live2dError::ModelData(format!(
                        "drawable {} deformer keys are not sorted",
                        drawable.id
                    )));
                }
                let offsets_ok = deformer.offsets.is_empty()
                    || (deformer.offsets.len() == deformer.keys.len()
                        && deformer.offsets.iter().all(|o| o.len() == len));
                let opacities_ok = deformer.opacities.is_empty()
                    || deformer.opacities.len() == deformer.keys.len();
                if !offsets_ok || !opacities_ok {
                    return Err(Live2dError::ModelData(format!(
                        "drawable {} deformer on {} has mismatched keyforms",
                        drawable.id, deformer.parameter
                    )));
                }
            }
        }
        Ok(())
    }
}
