//! Cubism2 表情（.exp.json）

use serde::Deserialize;

use crate::moc::CoreModel;
use crate::motion::MotionClip;
use crate::Result;

#[derive(Deserialize)]
struct ExpressionJson {
    #[serde(default)]
    fade_in: Option<f64>,
    #[serde(default)]
    fade_out: Option<f64>,
    #[serde(default)]
    params: Vec<ExpressionParamJson>,
}

#[derive(Deserialize)]
struct ExpressionParamJson {
    id: String,
    val: f32,
    #[serde(default)]
    def: Option<f32>,
    #[serde(default)]
    calc: Option<String>,
}

/// Cubism2 表情
///
/// 加载时按 calc 预先换算：`add` 减去默认值，`mult` 除以默认值；
/// 应用时统一写 `val * weight`。
#[derive(Debug, Clone)]
pub struct Expression2 {
    fade_in: f64,
    fade_out: f64,
    params: Vec<(String, f32)>,
}

impl Expression2 {
    /// 时间为毫秒，文件中的值不为正时用 `default_fade`
    pub fn from_slice(bytes: &[u8], default_fade: f64) -> Result<Self> {
        let json: ExpressionJson = serde_json::from_slice(bytes)?;
        let fade = |v: Option<f64>| v.filter(|v| *v > 0.0).unwrap_or(default_fade);

        let params = json
            .params
            .into_iter()
            .map(|p| {
                let val = match p.calc.as_deref().unwrap_or("add") {
                    "add" => p.val - p.def.unwrap_or(0.0),
                    "mult" => {
                        let def = p.def.filter(|d| *d != 0.0).unwrap_or(1.0);
                        p.val / def
                    }
                    _ => p.val,
                };
                (p.id, val)
            })
            .collect();

        Ok(Self {
            fade_in: fade(json.fade_in),
            fade_out: fade(json.fade_out),
            params,
        })
    }

    pub fn params(&self) -> &[(String, f32)] {
        &self.params
    }
}

impl MotionClip for Expression2 {
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
        for (id, val) in &self.params {
            core.set_parameter_value_by_id(id, val * weight, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPRESSION: &str = r#"{
        "type": "Live2D Expression",
        "fade_in": 0,
        "fade_out": 300,
        "params": [
            { "id": "PARAM_ANGLE_X", "val": 10, "def": 2 },
            { "id": "PARAM_ANGLE_Y", "val": 6, "def": 2, "calc": "mult" },
            { "id": "PARAM_ANGLE_Z", "val": 4, "calc": "set" }
        ]
    }"#;

    #[test]
    fn test_precompute() {
        let expression = Expression2::from_slice(EXPRESSION.as_bytes(), 500.0).unwrap();
        assert_eq!(expression.fade_in_time(), 500.0);
        assert_eq!(expression.fade_out_time(), 300.0);
        assert_eq!(
            expression.params(),
            &[
                ("PARAM_ANGLE_X".to_string(), 8.0),
                ("PARAM_ANGLE_Y".to_string(), 3.0),
                ("PARAM_ANGLE_Z".to_string(), 4.0),
            ]
        );
    }

    #[test]
    fn test_apply_sets_weighted_value() {
        let mut core = CoreModel::from_slice(crate::testing::cubism2_moc_json().as_bytes()).unwrap();
        core.set_parameter_value_by_id("PARAM_ANGLE_X", 20.0, 1.0);
        let expression = Expression2::from_slice(EXPRESSION.as_bytes(), 500.0).unwrap();
        expression.apply(&mut core, 0.0, 0.5);
        assert_eq!(core.parameter_value_by_id("PARAM_ANGLE_X"), Some(4.0));
        assert_eq!(core.parameter_value_by_id("PARAM_ANGLE_Z"), Some(2.0));
    }
}
