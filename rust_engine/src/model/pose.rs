//! 姿势（部件显示切换）
//!
//! 同组部件中只有一个可见，切换时淡入新部件、按比例压低旧部件；
//! 链接部件跟随源部件的不透明度。

use crate::moc::CoreModel;

const EPSILON: f32 = 0.001;
const PHI: f32 = 0.5;
const BACK_OPACITY_THRESHOLD: f32 = 0.15;

/// 默认淡入时间（秒）
pub const DEFAULT_POSE_FADE_TIME: f32 = 0.5;

/// 组内部件
#[derive(Debug, Clone)]
pub struct PosePart {
    pub part_id: String,
    /// 控制该部件可见性的参数
    pub parameter_id: String,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct ResolvedPart {
    part: Option<usize>,
    parameter: Option<usize>,
    links: Vec<usize>,
}

pub struct Pose {
    groups: Vec<Vec<PosePart>>,
    resolved: Vec<Vec<ResolvedPart>>,
    fade_time: f32,
    initialized: bool,
}

impl Pose {
    pub fn new(groups: Vec<Vec<PosePart>>, fade_time: f32) -> Self {
        let fade_time = if fade_time > 0.0 { fade_time } else { DEFAULT_POSE_FADE_TIME };
        Self {
            groups,
            resolved: Vec::new(),
            fade_time,
            initialized: false,
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn fade_time(&self) -> f32 {
        self.fade_time
    }

    /// 解析下标，每组第一个部件可见
    pub fn reset(&mut self, core: &mut CoreModel) {
        self.resolved = self
            .groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|p| ResolvedPart {
                        part: core.part_index(&p.part_id),
                        parameter: core.parameter_index(&p.parameter_id),
                        links: p.links.iter().filter_map(|l| core.part_index(l)).collect(),
                    })
                    .collect()
            })
            .collect();

        for group in &self.resolved {
            for (j, entry) in group.iter().enumerate() {
                let Some(part) = entry.part else { continue };
                let visible = if j == 0 { 1.0 } else { 0.0 };
                core.set_part_opacity(part, visible);
                if let Some(parameter) = entry.parameter {
                    core.set_parameter_value(parameter, visible, 1.0);
                }
            }
        }
        self.initialized = true;
    }

    /// 推进 dt 秒
    pub fn update(&mut self, core: &mut CoreModel, dt: f32) {
        if !self.initialized {
            self.reset(core);
        }
        let dt = dt.max(0.0);

        for group in &self.resolved {
            Self::fade_group(core, group, dt, self.fade_time);
        }
        self.copy_part_opacities(core);
    }

    fn fade_group(core: &mut CoreModel, group: &[ResolvedPart], dt: f32, fade_time: f32) {
        let mut visible_index: Option<usize> = None;
        let mut new_opacity = 1.0;

        for (i, entry) in group.iter().enumerate() {
            let value = entry.parameter.map(|p| core.parameter_value(p)).unwrap_or(0.0);
            if value > EPSILON {
                if visible_index.is_some() {
                    break;
                }
                visible_index = Some(i);
                let current = entry.part.map(|p| core.part_opacity(p)).unwrap_or(0.0);
                new_opacity = (current + dt / fade_time).min(1.0);
            }
        }

        let visible_index = match visible_index {
            Some(i) => i,
            None => {
                new_opacity = 1.0;
                0
            }
        };

        for (i, entry) in group.iter().enumerate() {
            let Some(part) = entry.part else { continue };

            if i == visible_index {
                core.set_part_opacity(part, new_opacity);
                continue;
            }

            let mut opacity = core.part_opacity(part);
            let mut a1 = if new_opacity < PHI {
                new_opacity * (PHI - 1.0) / PHI + 1.0
            } else {
                (1.0 - new_opacity) * PHI / (1.0 - PHI)
            };

            let back_opacity = (1.0 - a1) * (1.0 - new_opacity);
            if back_opacity > BACK_OPACITY_THRESHOLD {
                a1 = 1.0 - BACK_OPACITY_THRESHOLD / (1.0 - new_opacity);
            }

            if opacity > a1 {
                opacity = a1;
            }
            core.set_part_opacity(part, opacity);
        }
    }

    fn copy_part_opacities(&self, core: &mut CoreModel) {
        for entry in self.resolved.iter().flatten() {
            let Some(part) = entry.part else { continue };
            if entry.links.is_empty() {
                continue;
            }
            let opacity = core.part_opacity(part);
            for &link in &entry.links {
                core.set_part_opacity(link, opacity);
            }
        }
    }
}
