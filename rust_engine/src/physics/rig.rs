//! 摆锤物理
//!
//! 每个设置是一条粒子链：输入参数推动根粒子平移 / 旋转，
//! 子粒子受重力、风和延迟速度影响，最后把粒子间方向写回输出参数。

use glam::Vec2;

use super::normalize::{direction_to_radian, normalize_parameter_value, radian_to_direction, NormalizationRange};
use crate::config::get_config;
use crate::moc::CoreModel;

/// 输入 / 输出分量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsComponent {
    X,
    Y,
    Angle,
}

/// 输入映射方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMapping {
    /// 参数范围映射到归一化范围
    Normalized {
        position: NormalizationRange,
        angle: NormalizationRange,
    },
    /// 参数值直接乘输入系数
    Direct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsInput {
    pub parameter_id: String,
    pub component: PhysicsComponent,
    /// 0..1
    pub weight: f32,
    pub scale: f32,
    pub reflect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsOutput {
    pub parameter_id: String,
    pub vertex_index: usize,
    pub component: PhysicsComponent,
    pub scale: f32,
    /// 0..1
    pub weight: f32,
    pub reflect: bool,
}

/// 粒子定义
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleDef {
    pub mobility: f32,
    pub delay: f32,
    pub acceleration: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsSettingDef {
    pub inputs: Vec<PhysicsInput>,
    pub outputs: Vec<PhysicsOutput>,
    pub particles: Vec<ParticleDef>,
    pub mapping: InputMapping,
}

#[derive(Debug, Clone, Copy, Default)]
struct Particle {
    def: Option<ParticleDef>,
    initial_position: Vec2,
    position: Vec2,
    last_position: Vec2,
    last_gravity: Vec2,
    velocity: Vec2,
}

struct PhysicsSetting {
    def: PhysicsSettingDef,
    input_indices: Vec<Option<usize>>,
    output_indices: Vec<Option<usize>>,
    particles: Vec<Particle>,
}

impl PhysicsSetting {
    fn new(def: PhysicsSettingDef, core: &CoreModel) -> Self {
        let input_indices = def.inputs.iter().map(|i| core.parameter_index(&i.parameter_id)).collect();
        let output_indices = def.outputs.iter().map(|o| core.parameter_index(&o.parameter_id)).collect();
        let mut setting = Self {
            def,
            input_indices,
            output_indices,
            particles: Vec::new(),
        };
        setting.reset();
        setting
    }

    fn reset(&mut self) {
        let mut particles: Vec<Particle> = Vec::with_capacity(self.def.particles.len());
        for (i, def) in self.def.particles.iter().enumerate() {
            let initial_position = match particles.last() {
                Some(prev) if i > 0 => prev.initial_position + Vec2::new(0.0, def.radius),
                _ => Vec2::ZERO,
            };
            particles.push(Particle {
                def: Some(*def),
                initial_position,
                position: initial_position,
                last_position: initial_position,
                last_gravity: Vec2::new(0.0, 1.0),
                velocity: Vec2::ZERO,
            });
        }
        self.particles = particles;
    }
}

pub struct PhysicsRig {
    settings: Vec<PhysicsSetting>,
    gravity: Vec2,
    wind: Vec2,
    supports_wind: bool,
}

impl PhysicsRig {
    pub fn new(defs: Vec<PhysicsSettingDef>, core: &CoreModel, supports_wind: bool) -> Self {
        Self {
            settings: defs.into_iter().map(|d| PhysicsSetting::new(d, core)).collect(),
            gravity: Vec2::new(0.0, -1.0),
            wind: Vec2::ZERO,
            supports_wind,
        }
    }

    pub fn setting_count(&self) -> usize {
        self.settings.len()
    }

    pub fn supports_wind(&self) -> bool {
        self.supports_wind
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn wind(&self) -> Vec2 {
        self.wind
    }

    /// 不支持风时返回 false
    pub fn set_wind(&mut self, wind: Vec2) -> bool {
        if !self.supports_wind {
            return false;
        }
        if wind.is_finite() {
            self.wind = wind;
        }
        true
    }

    /// 粒子回到初始位置
    pub fn reset(&mut self) {
        for setting in &mut self.settings {
            setting.reset();
        }
    }

    /// 推进 dt 秒
    pub fn evaluate(&mut self, core: &mut CoreModel, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let config = get_config();
        let wind = if self.supports_wind { self.wind } else { Vec2::ZERO };

        for setting in &mut self.settings {
            let mut translation = Vec2::ZERO;
            let mut total_angle = 0.0f32;

            for (input, index) in setting.def.inputs.iter().zip(&setting.input_indices) {
                let Some(index) = *index else { continue };
                let value = core.parameter_value(index);

                let contribution = match setting.def.mapping {
                    InputMapping::Normalized { position, angle } => {
                        let (min, max) = core.parameter_range(index).unwrap_or((value, value));
                        let range = if input.component == PhysicsComponent::Angle { angle } else { position };
                        normalize_parameter_value(value, min, max, &range, input.reflect) * input.scale
                    }
                    InputMapping::Direct => {
                        let v = value * input.scale;
                        if input.reflect {
                            -v
                        } else {
                            v
                        }
                    }
                } * input.weight;

                match input.component {
                    PhysicsComponent::X => translation.x += contribution,
                    PhysicsComponent::Y => translation.y += contribution,
                    PhysicsComponent::Angle => total_angle += contribution,
                }
            }

            let rad = (-total_angle).to_radians();
            let translation = Vec2::new(
                translation.x * rad.cos() - translation.y * rad.sin(),
                translation.x * rad.sin() + translation.y * rad.cos(),
            );

            update_particles(
                &mut setting.particles,
                translation,
                total_angle,
                wind,
                config.physics_movement_threshold,
                dt,
                config.physics_air_resistance,
            );

            for (output, index) in setting.def.outputs.iter().zip(&setting.output_indices) {
                let i = output.vertex_index;
                if i < 1 || i >= setting.particles.len() {
                    break;
                }
                let Some(index) = *index else { continue };

                let particles = &setting.particles;
                let delta = particles[i].position - particles[i - 1].position;
                let mut value = match output.component {
                    PhysicsComponent::X => delta.x,
                    PhysicsComponent::Y => delta.y,
                    PhysicsComponent::Angle => {
                        let parent = if i >= 2 {
                            particles[i - 1].position - particles[i - 2].position
                        } else {
                            -self.gravity
                        };
                        direction_to_radian(parent, delta)
                    }
                };
                if output.reflect {
                    value = -value;
                }

                let value = value * output.scale;
                if !value.is_finite() {
                    continue;
                }
                let (min, max) = core.parameter_range(index).unwrap_or((value, value));
                let value = value.max(min).min(max);

                if output.weight >= 1.0 {
                    core.set_parameter_value(index, value, 1.0);
                } else {
                    core.set_parameter_value(index, value, output.weight.max(0.0));
                }
            }
        }
    }
}

fn update_particles(
    particles: &mut [Particle],
    translation: Vec2,
    total_angle: f32,
    wind: Vec2,
    threshold: f32,
    dt: f32,
    air_resistance: f32,
) {
    let Some(root) = particles.first_mut() else { return };
    root.position = translation;

    let gravity = radian_to_direction(total_angle.to_radians()).normalize_or_zero();

    for i in 1..particles.len() {
        let prev = particles[i - 1];
        let p = &mut particles[i];
        let Some(def) = p.def else { continue };

        let force = gravity * def.acceleration + wind;
        p.last_position = p.position;

        let delay = def.delay * dt * air_resistance;

        let direction = p.position - prev.position;
        let radian = direction_to_radian(p.last_gravity, gravity) / air_resistance;
        let (sin, cos) = radian.sin_cos();
        let direction = Vec2::new(cos * direction.x - sin * direction.y, sin * direction.x + cos * direction.y);

        p.position = prev.position + direction;
        p.position += p.velocity * delay + force * delay * delay;

        let new_direction = (p.position - prev.position).normalize_or_zero();
        p.position = prev.position + new_direction * def.radius;

        if p.position.x.abs() < threshold {
            p.position.x = 0.0;
        }

        if delay != 0.0 {
            p.velocity = (p.position - p.last_position) / delay * def.mobility;
        }

        p.last_gravity = gravity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> CoreModel {
        CoreModel::from_slice(
            br#"{
                "canvas": { "width": 100, "height": 100 },
                "parameters": [
                    { "id": "ParamAngleX", "min": -30, "max": 30 },
                    { "id": "ParamHair", "min": -1, "max": 1 }
                ]
            }"#,
        )
        .unwrap()
    }

    fn setting() -> PhysicsSettingDef {
        PhysicsSettingDef {
            inputs: vec![PhysicsInput {
                parameter_id: "ParamAngleX".into(),
                component: PhysicsComponent::X,
                weight: 0.6,
                scale: 1.0,
                reflect: false,
            }],
            outputs: vec![PhysicsOutput {
                parameter_id: "ParamHair".into(),
                vertex_index: 1,
                component: PhysicsComponent::Angle,
                scale: 1.0,
                weight: 1.0,
                reflect: false,
            }],
            particles: vec![
                ParticleDef { mobility: 1.0, delay: 1.0, acceleration: 1.0, radius: 0.0 },
                ParticleDef { mobility: 0.95, delay: 0.9, acceleration: 1.5, radius: 3.0 },
            ],
            mapping: InputMapping::Normalized {
                position: NormalizationRange::new(-10.0, 0.0, 10.0),
                angle: NormalizationRange::new(-10.0, 0.0, 10.0),
            },
        }
    }

    #[test]
    fn test_rest_state_stays_still() {
        let mut core = core();
        let mut rig = PhysicsRig::new(vec![setting()], &core, true);
        for _ in 0..30 {
            rig.evaluate(&mut core, 1.0 / 60.0);
        }
        assert!(core.parameter_value_by_id("ParamHair").unwrap().abs() < 0.001);
    }

    #[test]
    fn test_input_swings_output() {
        let mut core = core();
        let mut rig = PhysicsRig::new(vec![setting()], &core, true);
        core.set_parameter_value_by_id("ParamAngleX", 30.0, 1.0);
        rig.evaluate(&mut core, 1.0 / 60.0);
        let hair = core.parameter_value_by_id("ParamHair").unwrap();
        assert!(hair.abs() > 0.001);
        assert!(hair.abs() <= 1.0);
    }

    #[test]
    fn test_zero_dt_is_ignored() {
        let mut core = core();
        let mut rig = PhysicsRig::new(vec![setting()], &core, true);
        core.set_parameter_value_by_id("ParamAngleX", 30.0, 1.0);
        rig.evaluate(&mut core, 0.0);
        assert_eq!(core.parameter_value_by_id("ParamHair"), Some(0.0));
    }

    #[test]
    fn test_wind() {
        let core = core();
        let mut rig = PhysicsRig::new(vec![setting()], &core, true);
        assert!(rig.set_wind(Vec2::new(2.0, 0.0)));
        assert_eq!(rig.wind(), Vec2::new(2.0, 0.0));

        let mut windless = PhysicsRig::new(vec![setting()], &core, false);
        assert!(!windless.set_wind(Vec2::new(2.0, 0.0)));
        assert_eq!(windless.wind(), Vec2::ZERO);
    }

    #[test]
    fn test_wind_pushes_particles() {
        let mut core = core();
        let mut rig = PhysicsRig::new(vec![setting()], &core, true);
        rig.set_wind(Vec2::new(5.0, 0.0));
        for _ in 0..10 {
            rig.evaluate(&mut core, 1.0 / 60.0);
        }
        assert!(core.parameter_value_by_id("ParamHair").unwrap().abs() > 0.001);
    }
}
