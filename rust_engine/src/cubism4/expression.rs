//! exp3.json 表情

use serde::Deserialize;

use crate::moc::CoreModel;
use crate::motion::MotionClip;
use crate::Result;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Exp3Json {
    #[serde(default)]
    fade_in_time: Option<f64>,
    #[serde(default)]
    fade_out_time: Option<f64>,
    #[serde(default)]
    parameters: Vec<Exp3Parameter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Exp3Parameter {
    id: String,
    value: f32,
    #[serde(default)]
    blend: Option<String>,
}

/// 表情参数混合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionBlend {
    Add,
    Multiply,
    Overwrite,
}

impl ExpressionBlend {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("Multiply") => Self::Multiply,
            Some("Overwrite") => Self::Overwrite,
            _ => Self::Add,
        }
    }
}

/// Cubism4 表情
#[derive(Debug, Clone)]
pub struct Expression3 {
    fade_in: f64,
    fade_out: f64,
    parameters: Vec<(String, f32, ExpressionBlend)>,
}

impl Expression3 {
    /// 时间为秒，文件未给出时用 `default_fade`
    pub fn from_slice(bytes: &[u8], default_fade: f64) -> Result<Self> {
        let json: Exp3Json = serde_json::from_slice(bytes)?;
        let fade = |v: Option<f64>| v.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(default_fade);

        Ok(Self {
            fade_in: fade(json.fade_in_time),
            fade_out: fade(json.fade_out_time),
            parameters: json
                .parameters
                .into_iter()
                .map(|p| {
                    let blend = ExpressionBlend::from_name(p.blend.as_deref());
                    (p.id, p.value, blend)
                })
                .collect(),
        })
    }

    pub fn parameters(&self) -> &[(String, f32, ExpressionBlend)] {
        &self.parameters
    }
}

impl MotionClip for Expression3 {
    /// 表情常驻，直到被替换或重置
    fn duration(&self) -> Option<f64> {
        None
    }

    fn fade_in_time(&self) -> f64 {
        self.fade_in
    }

    fn fade_out_time(&self) -> f64 {
        self.fade_out
    }

    fn apply(&self, core: &mut CoreModel, _elapsed: f64, weight: f32) {
        for (id, value, blend) in &self.parameters {
            match blend {
                ExpressionBlend::Add => core.add_parameter_value_by_id(id, *value, weight),
                ExpressionBlend::Multiply => core.multiply_parameter_value_by_id(id, *value, weight),
                ExpressionBlend::Overwrite => core.set_parameter_value_by_id(id, *value, weight),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPRESSION: &str = r#"{
        "Type": "Live2D Expression",
        "FadeInTime": 0.2,
        "Parameters": [
            { "Id": "ParamAngleX", "Value": 10, "Blend": "Add" },
            { "Id": "ParamAngleY", "Value": 2, "Blend": "Multiply" },
            { "Id": "ParamAngleZ", "Value": -5, "Blend": "Overwrite" },
            { "Id": "ParamMissing", "Value": 1 }
        ]
    }"#;

    fn core() -> CoreModel {
        CoreModel::from_slice(crate::testing::cubism4_moc_json().as_bytes()).unwrap()
    }

    #[test]
    fn test_parse() {
        let expression = Expression3::from_slice(EXPRESSION.as_bytes(), 0.5).unwrap();
        assert_eq!(expression.fade_in_time(), 0.2);
        assert_eq!(expression.fade_out_time(), 0.5);
        assert_eq!(expression.duration(), None);
        assert_eq!(expression.parameters().len(), 4);
        assert_eq!(expression.parameters()[3].2, ExpressionBlend::Add);
    }

    #[test]
    fn test_apply_blends() {
        let mut core = core();
        core.set_parameter_value_by_id("ParamAngleX", 1.0, 1.0);
        core.set_parameter_value_by_id("ParamAngleY", 3.0, 1.0);
        core.set_parameter_value_by_id("ParamAngleZ", 4.0, 1.0);

        let expression = Expression3::from_slice(EXPRESSION.as_bytes(), 0.5).unwrap();
        expression.apply(&mut core, 0.0, 1.0);

        assert_eq!(core.parameter_value_by_id("ParamAngleX"), Some(11.0));
        assert_eq!(core.parameter_value_by_id("ParamAngleY"), Some(6.0));
        assert_eq!(core.parameter_value_by_id("ParamAngleZ"), Some(-5.0));
    }

    #[test]
    fn test_apply_half_weight() {
        let mut core = core();
        let expression = Expression3::from_slice(EXPRESSION.as_bytes(), 0.5).unwrap();
        expression.apply(&mut core, 0.0, 0.5);
        assert_eq!(core.parameter_value_by_id("ParamAngleX"), Some(5.0));
        assert_eq!(core.parameter_value_by_id("ParamAngleZ"), Some(-2.5));
    }
}
