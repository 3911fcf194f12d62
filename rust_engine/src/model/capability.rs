//! 能力描述
//!
//! 加载时确定一次：格式、眼睛参数 id、是否支持风 / 表情 / 物理 / 姿势。

use super::ModelFormat;

/// 眼睛参数 id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeParameterIds {
    pub left_open: &'static str,
    pub right_open: &'static str,
    pub ball_x: &'static str,
    pub ball_y: &'static str,
}

pub const CUBISM4_EYE_PARAMS: EyeParameterIds = EyeParameterIds {
    left_open: "ParamEyeLOpen",
    right_open: "ParamEyeROpen",
    ball_x: "ParamEyeBallX",
    ball_y: "ParamEyeBallY",
};

pub const CUBISM2_EYE_PARAMS: EyeParameterIds = EyeParameterIds {
    left_open: "PARAM_EYE_L_OPEN",
    right_open: "PARAM_EYE_R_OPEN",
    ball_x: "PARAM_EYE_BALL_X",
    ball_y: "PARAM_EYE_BALL_Y",
};

/// angle x / y / z, body x, eye ball x / y
pub const CUBISM4_FOCUS_PARAMS: [&str; 6] = [
    "ParamAngleX",
    "ParamAngleY",
    "ParamAngleZ",
    "ParamBodyAngleX",
    "ParamEyeBallX",
    "ParamEyeBallY",
];

pub const CUBISM2_FOCUS_PARAMS: [&str; 6] = [
    "PARAM_ANGLE_X",
    "PARAM_ANGLE_Y",
    "PARAM_ANGLE_Z",
    "PARAM_BODY_ANGLE_X",
    "PARAM_EYE_BALL_X",
    "PARAM_EYE_BALL_Y",
];

pub const CUBISM4_BREATH_PARAM: &str = "ParamBreath";
pub const CUBISM2_BREATH_PARAM: &str = "PARAM_BREATH";
pub const CUBISM4_MOUTH_OPEN_PARAM: &str = "ParamMouthOpenY";
pub const CUBISM2_MOUTH_OPEN_PARAM: &str = "PARAM_MOUTH_OPEN_Y";

/// 模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub format: ModelFormat,
    pub eye_params: EyeParameterIds,
    /// 物理是否接受风
    pub wind: bool,
    pub expressions: bool,
    pub physics: bool,
    pub pose: bool,
}

impl Capabilities {
    pub fn new(format: ModelFormat) -> Self {
        let eye_params = match format {
            ModelFormat::Cubism4 => CUBISM4_EYE_PARAMS,
            ModelFormat::Cubism2 => CUBISM2_EYE_PARAMS,
        };
        Self {
            format,
            eye_params,
            wind: false,
            expressions: false,
            physics: false,
            pose: false,
        }
    }
}
