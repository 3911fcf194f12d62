//! motion3.json 动作
//!
//! 曲线段：线性 / 贝塞尔 / 阶梯 / 反阶梯。时间单位为秒。

use serde::Deserialize;

use crate::moc::CoreModel;
use crate::motion::{BezierCurve, MotionClip};
use crate::{Live2dError, Result};

const SEGMENT_LINEAR: u32 = 0;
const SEGMENT_BEZIER: u32 = 1;
const SEGMENT_STEPPED: u32 = 2;
const SEGMENT_INVERSE_STEPPED: u32 = 3;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Json {
    meta: Meta3,
    #[serde(default)]
    curves: Vec<Curve3Json>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Meta3 {
    duration: f64,
    #[serde(default)]
    r#loop: bool,
    #[serde(default)]
    fade_in_time: Option<f64>,
    #[serde(default)]
    fade_out_time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Curve3Json {
    target: String,
    id: String,
    segments: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
enum SegmentKind {
    Linear,
    Bezier(BezierCurve),
    Stepped,
    InverseStepped,
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    start: (f32, f32),
    end: (f32, f32),
    kind: SegmentKind,
}

impl Segment {
    fn evaluate(&self, time: f32) -> f32 {
        let span = self.end.0 - self.start.0;
        let t = if span > 0.0 { ((time - self.start.0) / span).clamp(0.0, 1.0) } else { 1.0 };
        match &self.kind {
            SegmentKind::Linear => self.start.1 + (self.end.1 - self.start.1) * t,
            SegmentKind::Bezier(curve) => curve.evaluate(t),
            SegmentKind::Stepped => self.start.1,
            SegmentKind::InverseStepped => self.end.1,
        }
    }
}

/// 曲线目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurveTarget {
    Parameter(String),
    PartOpacity(String),
    /// 模型级曲线（EyeBlink / LipSync / Opacity），不直接写参数
    Model(String),
}

#[derive(Debug, Clone)]
struct Curve {
    target: CurveTarget,
    first_value: f32,
    segments: Vec<Segment>,
}

impl Curve {
    fn evaluate(&self, time: f32) -> f32 {
        let Some(first) = self.segments.first() else {
            return self.first_value;
        };
        if time <= first.start.0 {
            return first.start.1;
        }
        for segment in &self.segments {
            if time <= segment.end.0 {
                return segment.evaluate(time);
            }
        }
        self.segments.last().map(|s| s.end.1).unwrap_or(self.first_value)
    }
}

fn parse_segments(id: &str, raw: &[f32]) -> Result<(f32, Vec<Segment>)> {
    let invalid = || Live2dError::Motion(format!("Invalid segments in curve {}", id));
    if raw.len() < 2 {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    let mut last = (raw[0], raw[1]);
    let mut i = 2;

    while i < raw.len() {
        let kind = raw[i] as u32;
        let need = match kind {
            SEGMENT_BEZIER => 6,
            SEGMENT_LINEAR | SEGMENT_STEPPED | SEGMENT_INVERSE_STEPPED => 2,
            _ => return Err(invalid()),
        };
        let points = raw.get(i + 1..i + 1 + need).ok_or_else(invalid)?;

        let segment = match kind {
            SEGMENT_BEZIER => {
                let p1 = (points[0], points[1]);
                let p2 = (points[2], points[3]);
                let p3 = (points[4], points[5]);
                Segment {
                    start: last,
                    end: p3,
                    kind: SegmentKind::Bezier(BezierCurve::from_points(last, p1, p2, p3)),
                }
            }
            _ => {
                let end = (points[0], points[1]);
                let kind = match kind {
                    SEGMENT_STEPPED => SegmentKind::Stepped,
                    SEGMENT_INVERSE_STEPPED => SegmentKind::InverseStepped,
                    _ => SegmentKind::Linear,
                };
                Segment { start: last, end, kind }
            }
        };

        last = segment.end;
        segments.push(segment);
        i += 1 + need;
    }

    Ok((raw[1], segments))
}

/// Cubism4 动作
#[derive(Debug, Clone)]
pub struct Motion3 {
    duration: f64,
    looped: bool,
    fade_in: f64,
    fade_out: f64,
    curves: Vec<Curve>,
}

impl Motion3 {
    /// `fade_in` / `fade_out`（秒）来自设置文件时优先于动作文件自身的值，
    /// 都没有时用 `default_fade`
    pub fn from_slice(bytes: &[u8], fade_in: Option<f64>, fade_out: Option<f64>, default_fade: f64) -> Result<Self> {
        let json: Motion3Json = serde_json::from_slice(bytes)?;

        let curves = json
            .curves
            .into_iter()
            .map(|c| {
                let (first_value, segments) = parse_segments(&c.id, &c.segments)?;
                let target = match c.target.as_str() {
                    "Parameter" => CurveTarget::Parameter(c.id),
                    "PartOpacity" => CurveTarget::PartOpacity(c.id),
                    _ => CurveTarget::Model(c.id),
                };
                Ok(Curve {
                    target,
                    first_value,
                    segments,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pick = |explicit: Option<f64>, meta: Option<f64>| {
            explicit
                .or(meta)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default_fade)
        };

        Ok(Self {
            duration: json.meta.duration.max(0.0),
            looped: json.meta.r#loop,
            fade_in: pick(fade_in, json.meta.fade_in_time),
            fade_out: pick(fade_out, json.meta.fade_out_time),
            curves,
        })
    }

    pub fn is_loop(&self) -> bool {
        self.looped
    }

    pub fn curve_count(&self) -> usize {
        self.curves.len()
    }

    /// 某条曲线在 time 秒的值
    pub fn value_at(&self, target: &CurveTarget, time: f64) -> Option<f32> {
        self.curves
            .iter()
            .find(|c| &c.target == target)
            .map(|c| c.evaluate(self.local_time(time) as f32))
    }

    fn local_time(&self, elapsed: f64) -> f64 {
        if self.looped && self.duration > 0.0 {
            elapsed % self.duration
        } else {
            elapsed
        }
    }
}

impl MotionClip for Motion3 {
    fn duration(&self) -> Option<f64> {
        if self.looped {
            None
        } else {
            Some(self.duration)
        }
    }

    fn fade_in_time(&self) -> f64 {
        self.fade_in
    }

    fn fade_out_time(&self) -> f64 {
        self.fade_out
    }

    fn apply(&self, core: &mut CoreModel, elapsed: f64, weight: f32) {
        let time = self.local_time(elapsed) as f32;
        for curve in &self.curves {
            let value = curve.evaluate(time);
            match &curve.target {
                CurveTarget::Parameter(id) => {
                    core.set_parameter_value_by_id(id, value, weight);
                }
                CurveTarget::PartOpacity(id) => {
                    core.set_part_opacity_by_id(id, value);
                }
                CurveTarget::Model(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOTION: &str = r#"{
        "Version": 3,
        "Meta": { "Duration": 2.0, "Fps": 30, "Loop": false, "FadeInTime": 0.25 },
        "Curves": [
            { "Target": "Parameter", "Id": "ParamAngleX",
              "Segments": [0, 0, 0, 1, 10, 2, 1.5, -10, 3, 2, 20] },
            { "Target": "Parameter", "Id": "ParamAngleY",
              "Segments": [0, 0, 1, 0.5, 0, 0.5, 10, 1, 10] },
            { "Target": "PartOpacity", "Id": "PartArm", "Segments": [0, 1, 0, 2, 0] },
            { "Target": "Model", "Id": "EyeBlink", "Segments": [0, 1, 0, 2, 1] }
        ]
    }"#;

    #[test]
    fn test_segments() {
        let motion = Motion3::from_slice(MOTION.as_bytes(), None, None, 0.5).unwrap();
        let angle_x = CurveTarget::Parameter("ParamAngleX".into());

        assert_eq!(motion.value_at(&angle_x, 0.0), Some(0.0));
        assert!((motion.value_at(&angle_x, 0.5).unwrap() - 5.0).abs() < 0.001);
        // 阶梯段保持起点值
        assert_eq!(motion.value_at(&angle_x, 1.2), Some(10.0));
        // 反阶梯段取终点值
        assert_eq!(motion.value_at(&angle_x, 1.8), Some(20.0));
        assert_eq!(motion.value_at(&angle_x, 5.0), Some(20.0));

        let angle_y = CurveTarget::Parameter("ParamAngleY".into());
        assert!((motion.value_at(&angle_y, 0.5).unwrap() - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_fade_precedence() {
        let motion = Motion3::from_slice(MOTION.as_bytes(), None, None, 0.5).unwrap();
        assert_eq!(motion.fade_in_time(), 0.25);
        assert_eq!(motion.fade_out_time(), 0.5);
        assert_eq!(motion.duration(), Some(2.0));

        let motion = Motion3::from_slice(MOTION.as_bytes(), Some(1.0), Some(0.0), 0.5).unwrap();
        assert_eq!(motion.fade_in_time(), 1.0);
        assert_eq!(motion.fade_out_time(), 0.0);
    }

    #[test]
    fn test_loop() {
        let json = MOTION.replace("\"Loop\": false", "\"Loop\": true");
        let motion = Motion3::from_slice(json.as_bytes(), None, None, 0.5).unwrap();
        assert!(motion.is_loop());
        assert_eq!(motion.duration(), None);
        let angle_x = CurveTarget::Parameter("ParamAngleX".into());
        assert!((motion.value_at(&angle_x, 2.5).unwrap() - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_apply() {
        let mut core = CoreModel::from_slice(crate::testing::cubism4_moc_json().as_bytes()).unwrap();
        let motion = Motion3::from_slice(MOTION.as_bytes(), None, None, 0.5).unwrap();
        motion.apply(&mut core, 0.5, 1.0);
        assert!((core.parameter_value_by_id("ParamAngleX").unwrap() - 5.0).abs() < 0.001);

        motion.apply(&mut core, 0.5, 0.5);
        assert!((core.parameter_value_by_id("ParamAngleX").unwrap() - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_invalid_segments() {
        let json = r#"{ "Meta": { "Duration": 1 }, "Curves": [
            { "Target": "Parameter", "Id": "A", "Segments": [0, 0, 1, 0.3] } ] }"#;
        assert!(matches!(
            Motion3::from_slice(json.as_bytes(), None, None, 0.5),
            Err(Live2dError::Motion(_))
        ));
    }
}
