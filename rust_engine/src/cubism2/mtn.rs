//! .mtn 动作（Cubism2）
//!
//! 文本格式，每行一条：
//! - `# 注释`
//! - `$fps=30` / `$fadein=1000` / `$fadeout=1000`
//! - `PARAM_ID=v0,v1,...` 逐帧参数值
//! - `VISIBLE:PARTS_ID=...` 姿势可见性参数
//! - `PARTS_VISIBLE:PARTS_ID=...` 部件不透明度
//!
//! 时间单位为毫秒，帧间线性插值。

use crate::moc::CoreModel;
use crate::motion::MotionClip;
use crate::{Live2dError, Result};

const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MtnTarget {
    /// 普通参数，按权重混合
    Parameter(String),
    /// `VISIBLE:` 参数，不参与淡入淡出
    Visible(String),
    PartOpacity(String),
}

#[derive(Debug, Clone)]
struct Track {
    target: MtnTarget,
    values: Vec<f32>,
}

impl Track {
    fn value_at(&self, frame: f64) -> f32 {
        let last = self.values.len() - 1;
        if frame <= 0.0 {
            return self.values[0];
        }
        let i = frame.floor() as usize;
        if i >= last {
            return self.values[last];
        }
        let r = (frame - i as f64) as f32;
        self.values[i] + (self.values[i + 1] - self.values[i]) * r
    }
}

/// Cubism2 动作
#[derive(Debug, Clone)]
pub struct MtnMotion {
    fps: f64,
    fade_in: f64,
    fade_out: f64,
    tracks: Vec<Track>,
    duration: f64,
    looped: bool,
}

impl MtnMotion {
    /// `fade_in` / `fade_out`（毫秒）来自设置文件时优先于文件头，都没有时用 `default_fade`
    pub fn parse(text: &str, fade_in: Option<f64>, fade_out: Option<f64>, default_fade: f64) -> Result<Self> {
        let mut fps = DEFAULT_FPS;
        let mut header_fade_in = None;
        let mut header_fade_out = None;
        let mut tracks = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();

            if let Some(name) = key.strip_prefix('$') {
                let number = value.trim().parse::<f64>().map_err(|_| {
                    Live2dError::Motion(format!("line {}: invalid value for ${}", line_no + 1, name))
                })?;
                match name {
                    "fps" if number > 0.0 => fps = number,
                    "fadein" => header_fade_in = Some(number),
                    "fadeout" => header_fade_out = Some(number),
                    _ => {}
                }
                continue;
            }

            let values = value
                .split(',')
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| Live2dError::Motion(format!("line {}: invalid frame value for {}", line_no + 1, key)))?;
            if values.is_empty() {
                continue;
            }

            let target = if let Some(id) = key.strip_prefix("PARTS_VISIBLE:") {
                MtnTarget::PartOpacity(id.to_string())
            } else if key.starts_with("VISIBLE:") {
                MtnTarget::Visible(key.to_string())
            } else {
                MtnTarget::Parameter(key.to_string())
            };
            tracks.push(Track { target, values });
        }

        let frames = tracks.iter().map(|t| t.values.len()).max().unwrap_or(0);
        let duration = frames as f64 * 1000.0 / fps;

        let pick = |explicit: Option<f64>, header: Option<f64>| {
            explicit
                .or(header)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default_fade)
        };

        Ok(Self {
            fps,
            fade_in: pick(fade_in, header_fade_in),
            fade_out: pick(fade_out, header_fade_out),
            tracks,
            duration,
            looped: false,
        })
    }

    pub fn from_slice(bytes: &[u8], fade_in: Option<f64>, fade_out: Option<f64>, default_fade: f64) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| Live2dError::Motion(e.to_string()))?;
        Self::parse(text, fade_in, fade_out, default_fade)
    }

    pub fn set_loop(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// 某条轨道在 time 毫秒的值
    pub fn value_at(&self, target: &MtnTarget, time: f64) -> Option<f32> {
        let frame = self.frame_at(time);
        self.tracks
            .iter()
            .find(|t| &t.target == target)
            .map(|t| t.value_at(frame))
    }

    fn frame_at(&self, elapsed: f64) -> f64 {
        let elapsed = if self.looped && self.duration > 0.0 {
            elapsed % self.duration
        } else {
            elapsed
        };
        elapsed * self.fps / 1000.0
    }
}

impl MotionClip for MtnMotion {
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
        let frame = self.frame_at(elapsed);
        for track in &self.tracks {
            let value = track.value_at(frame);
            match &track.target {
                MtnTarget::Parameter(id) => {
                    core.set_parameter_value_by_id(id, value, weight);
                }
                MtnTarget::Visible(id) => {
                    core.set_parameter_value_by_id(id, value, 1.0);
                }
                MtnTarget::PartOpacity(id) => {
                    core.set_part_opacity_by_id(id, value);
                }
            }
        }
    }
}
