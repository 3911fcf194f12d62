//! physics3.json 物理设置

use glam::Vec2;
use serde::Deserialize;

use crate::moc::CoreModel;
use crate::physics::{
    InputMapping, NormalizationRange, ParticleDef, PhysicsComponent, PhysicsInput, PhysicsOutput, PhysicsRig,
    PhysicsSettingDef,
};
use crate::Result;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Physics3Json {
    #[serde(default)]
    meta: Option<Meta3>,
    #[serde(default)]
    physics_settings: Vec<Setting3>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Meta3 {
    #[serde(default)]
    effective_forces: Option<EffectiveForces>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EffectiveForces {
    #[serde(default)]
    gravity: Option<Vector3>,
    #[serde(default)]
    wind: Option<Vector3>,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "PascalCase")]
struct Vector3 {
    x: f32,
    y: f32,
}

impl From<Vector3> for Vec2 {
    fn from(v: Vector3) -> Self {
        Vec2::new(v.x, v.y)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Setting3 {
    #[serde(default)]
    input: Vec<Input3>,
    #[serde(default)]
    output: Vec<Output3>,
    #[serde(default)]
    vertices: Vec<Vertex3>,
    #[serde(default)]
    normalization: Option<Normalization3>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Target3 {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Input3 {
    source: Target3,
    weight: f32,
    r#type: String,
    #[serde(default)]
    reflect: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Output3 {
    destination: Target3,
    vertex_index: usize,
    #[serde(default = "one")]
    scale: f32,
    weight: f32,
    r#type: String,
    #[serde(default)]
    reflect: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Vertex3 {
    mobility: f32,
    delay: f32,
    acceleration: f32,
    radius: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Normalization3 {
    position: Range3,
    angle: Range3,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "PascalCase")]
struct Range3 {
    minimum: f32,
    default: f32,
    maximum: f32,
}

impl From<Range3> for NormalizationRange {
    fn from(r: Range3) -> Self {
        NormalizationRange::new(r.minimum, r.default, r.maximum)
    }
}

fn one() -> f32 {
    1.0
}

fn component(name: &str) -> PhysicsComponent {
    match name {
        "Y" => PhysicsComponent::Y,
        "Angle" => PhysicsComponent::Angle,
        _ => PhysicsComponent::X,
    }
}

/// 解析结果：设置列表和有效力
#[derive(Debug, Clone)]
pub struct Physics3 {
    pub settings: Vec<PhysicsSettingDef>,
    pub gravity: Vec2,
    pub wind: Vec2,
}

impl Physics3 {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let json: Physics3Json = serde_json::from_slice(bytes)?;

        let forces = json.meta.and_then(|m| m.effective_forces);
        let gravity = forces
            .as_ref()
            .and_then(|f| f.gravity)
            .map(Vec2::from)
            .unwrap_or(Vec2::new(0.0, -1.0));
        let wind = forces.as_ref().and_then(|f| f.wind).map(Vec2::from).unwrap_or(Vec2::ZERO);

        let settings = json
            .physics_settings
            .into_iter()
            .map(|s| {
                let mapping = match s.normalization {
                    Some(n) => InputMapping::Normalized {
                        position: n.position.into(),
                        angle: n.angle.into(),
                    },
                    None => InputMapping::Normalized {
                        position: NormalizationRange::default(),
                        angle: NormalizationRange::default(),
                    },
                };
                PhysicsSettingDef {
                    inputs: s
                        .input
                        .into_iter()
                        .map(|i| PhysicsInput {
                            parameter_id: i.source.id,
                            component: component(&i.r#type),
                            weight: i.weight / 100.0,
                            scale: 1.0,
                            reflect: i.reflect,
                        })
                        .collect(),
                    outputs: s
                        .output
                        .into_iter()
                        .map(|o| PhysicsOutput {
                            parameter_id: o.destination.id,
                            vertex_index: o.vertex_index,
                            component: component(&o.r#type),
                            scale: o.scale,
                            weight: o.weight / 100.0,
                            reflect: o.reflect,
                        })
                        .collect(),
                    particles: s
                        .vertices
                        .into_iter()
                        .map(|v| ParticleDef {
                            mobility: v.mobility,
                            delay: v.delay,
                            acceleration: v.acceleration,
                            radius: v.radius,
                        })
                        .collect(),
                    mapping,
                }
            })
            .collect();

        Ok(Self { settings, gravity, wind })
    }

    /// 构建支持风的物理
    pub fn into_rig(self, core: &CoreModel) -> PhysicsRig {
        let mut rig = PhysicsRig::new(self.settings, core, true);
        rig.set_gravity(self.gravity);
        rig.set_wind(self.wind);
        rig
    }
}
