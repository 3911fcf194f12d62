//! 模型设置文件（model3.json / model.json）
//!
//! 两种格式解析成同一个不可变的 `ModelSettings`。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{Live2dError, Result};

/// 模型格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Cubism2,
    Cubism4,
}

/// 布局锚点（逻辑单位，逻辑尺寸为 2x2）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub center_x: Option<f32>,
    pub center_y: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
}

impl Layout {
    /// 按统一键名写入（centerX / center_x 等价）
    pub fn set(&mut self, key: &str, value: f32) {
        let slot = match key {
            "width" => &mut self.width,
            "height" => &mut self.height,
            "x" => &mut self.x,
            "y" => &mut self.y,
            "centerX" => &mut self.center_x,
            "centerY" => &mut self.center_y,
            "top" => &mut self.top,
            "bottom" => &mut self.bottom,
            "left" => &mut self.left,
            "right" => &mut self.right,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// 碰撞区域声明
#[derive(Debug, Clone, PartialEq)]
pub struct HitAreaDef {
    /// 可绘制对象 id
    pub id: String,
    pub name: String,
}

/// 动作声明
#[derive(Debug, Clone, Default)]
pub struct MotionDef {
    pub file: String,
    /// 毫秒
    pub fade_in: Option<f64>,
    /// 毫秒
    pub fade_out: Option<f64>,
    pub sound: Option<String>,
}

/// 表情声明
#[derive(Debug, Clone)]
pub struct ExpressionDef {
    pub name: String,
    pub file: String,
}

/// 模型设置
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub name: String,
    pub url: String,
    pub format: ModelFormat,
    pub moc: String,
    pub textures: Vec<String>,
    pub layout: Layout,
    pub hit_areas: Vec<HitAreaDef>,
    /// 初始参数覆盖
    pub init_params: Vec<(String, f32)>,
    /// 初始部件不透明度覆盖
    pub init_opacities: Vec<(String, f32)>,
    pub motions: BTreeMap<String, Vec<MotionDef>>,
    pub expressions: Vec<ExpressionDef>,
    pub physics: Option<String>,
    pub pose: Option<String>,
    pub lip_sync_ids: Vec<String>,
    pub eye_blink_ids: Vec<String>,
}

// ====== Cubism4 ======

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Model3Json {
    file_references: FileReferences3,
    #[serde(default)]
    groups: Vec<Group3>,
    #[serde(default)]
    hit_areas: Vec<HitArea3>,
    #[serde(default)]
    layout: BTreeMap<String, f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileReferences3 {
    moc: String,
    #[serde(default)]
    textures: Vec<String>,
    #[serde(default)]
    physics: Option<String>,
    #[serde(default)]
    pose: Option<String>,
    #[serde(default)]
    expressions: Vec<Expression3>,
    #[serde(default)]
    motions: BTreeMap<String, Vec<Motion3Ref>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Group3 {
    name: String,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HitArea3 {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Expression3 {
    name: String,
    file: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Ref {
    file: String,
    /// 秒
    #[serde(default)]
    fade_in_time: Option<f64>,
    #[serde(default)]
    fade_out_time: Option<f64>,
    #[serde(default)]
    sound: Option<String>,
}

// ====== Cubism2 ======

#[derive(Deserialize)]
struct Model2Json {
    #[serde(default)]
    name: Option<String>,
    model: String,
    textures: Vec<String>,
    #[serde(default)]
    layout: BTreeMap<String, f32>,
    #[serde(default)]
    hit_areas: Vec<HitArea2>,
    #[serde(default)]
    motions: BTreeMap<String, Vec<Motion2Ref>>,
    #[serde(default)]
    expressions: Vec<Expression2>,
    #[serde(default)]
    physics: Option<String>,
    #[serde(default)]
    pose: Option<String>,
    #[serde(default)]
    init_param: Vec<InitParam2>,
    #[serde(default)]
    init_parts_visible: Vec<InitPart2>,
}

#[derive(Deserialize)]
struct HitArea2 {
    name: String,
    id: String,
}

#[derive(Deserialize)]
struct Motion2Ref {
    file: String,
    /// 毫秒
    #[serde(default)]
    fade_in: Option<f64>,
    #[serde(default)]
    fade_out: Option<f64>,
    #[serde(default)]
    sound: Option<String>,
}

#[derive(Deserialize)]
struct Expression2 {
    name: String,
    file: String,
}

#[derive(Deserialize)]
struct InitParam2 {
    id: String,
    value: f32,
}

#[derive(Deserialize)]
struct InitPart2 {
    id: String,
    visible: f32,
}

/// 首字母小写：CenterX → centerX
fn uncapitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 取 URL 所在目录名作为模型名，没有目录时取文件名主干
fn name_from_url(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let file = segments.pop().unwrap_or("");
    if let Some(folder) = segments.last() {
        return folder.to_string();
    }
    file.split('.').next().unwrap_or(file).to_string()
}

impl ModelSettings {
    /// 由 JSON 判断格式
    pub fn detect_format(json: &Value) -> Option<ModelFormat> {
        if json.get("FileReferences").and_then(|r| r.get("Moc")).is_some() {
            Some(ModelFormat::Cubism4)
        } else if json.get("model").is_some() && json.get("textures").is_some() {
            Some(ModelFormat::Cubism2)
        } else {
            None
        }
    }

    /// 解析设置文件
    pub fn from_slice(bytes: &[u8], url: &str) -> Result<Self> {
        let json: Value = serde_json::from_slice(bytes)?;
        Self::from_json(json, url)
    }

    pub fn from_json(json: Value, url: &str) -> Result<Self> {
        match Self::detect_format(&json) {
            Some(ModelFormat::Cubism4) => Self::from_model3(serde_json::from_value(json)?, url),
            Some(ModelFormat::Cubism2) => Self::from_model2(serde_json::from_value(json)?, url),
            None => Err(Live2dError::Settings(format!(
                "Unknown settings format: {}",
                url
            ))),
        }
    }

    fn from_model3(json: Model3Json, url: &str) -> Result<Self> {
        let refs = json.file_references;

        let mut layout = Layout::default();
        for (key, value) in &json.layout {
            layout.set(&uncapitalize(key), *value);
        }

        let group_ids = |name: &str| {
            json.groups
                .iter()
                .filter(|g| g.name == name)
                .flat_map(|g| g.ids.iter().cloned())
                .collect::<Vec<_>>()
        };

        let motions = refs
            .motions
            .into_iter()
            .map(|(group, list)| {
                let defs = list
                    .into_iter()
                    .map(|m| MotionDef {
                        file: m.file,
                        fade_in: m.fade_in_time.map(|s| s * 1000.0),
                        fade_out: m.fade_out_time.map(|s| s * 1000.0),
                        sound: m.sound,
                    })
                    .collect();
                (group, defs)
            })
            .collect();

        Ok(Self {
            name: name_from_url(url),
            url: url.to_string(),
            format: ModelFormat::Cubism4,
            moc: refs.moc,
            textures: refs.textures,
            layout,
            hit_areas: json
                .hit_areas
                .into_iter()
                .map(|h| HitAreaDef { id: h.id, name: h.name })
                .collect(),
            init_params: Vec::new(),
            init_opacities: Vec::new(),
            motions,
            expressions: refs
                .expressions
                .into_iter()
                .map(|e| ExpressionDef { name: e.name, file: e.file })
                .collect(),
            physics: refs.physics,
            pose: refs.pose,
            lip_sync_ids: group_ids("LipSync"),
            eye_blink_ids: group_ids("EyeBlink"),
        })
    }

    fn from_model2(json: Model2Json, url: &str) -> Result<Self> {
        let mut layout = Layout::default();
        for (key, value) in &json.layout {
            let key = match key.as_str() {
                "center_x" => "centerX",
                "center_y" => "centerY",
                other => other,
            };
            layout.set(key, *value);
        }

        let motions = json
            .motions
            .into_iter()
            .map(|(group, list)| {
                let defs = list
                    .into_iter()
                    .map(|m| MotionDef {
                        file: m.file,
                        fade_in: m.fade_in,
                        fade_out: m.fade_out,
                        sound: m.sound,
                    })
                    .collect();
                (group, defs)
            })
            .collect();

        Ok(Self {
            name: json.name.unwrap_or_else(|| name_from_url(url)),
            url: url.to_string(),
            format: ModelFormat::Cubism2,
            moc: json.model,
            textures: json.textures,
            layout,
            hit_areas: json
                .hit_areas
                .into_iter()
                .map(|h| HitAreaDef { id: h.id, name: h.name })
                .collect(),
            init_params: json.init_param.into_iter().map(|p| (p.id, p.value)).collect(),
            init_opacities: json
                .init_parts_visible
                .into_iter()
                .map(|p| (p.id, p.visible))
                .collect(),
            motions,
            expressions: json
                .expressions
                .into_iter()
                .map(|e| ExpressionDef { name: e.name, file: e.file })
                .collect(),
            physics: json.physics,
            pose: json.pose,
            lip_sync_ids: Vec::new(),
            eye_blink_ids: Vec::new(),
        })
    }

    /// 相对设置文件所在目录解析路径
    pub fn resolve_path(&self, path: &str) -> String {
        if path.contains("://") || path.starts_with('/') {
            return path.to_string();
        }
        match self.url.rfind('/') {
            Some(pos) => format!("{}/{}", &self.url[..pos], path),
            None => path.to_string(),
        }
    }
}
