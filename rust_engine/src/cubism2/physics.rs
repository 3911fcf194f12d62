//! Cubism2 头发物理（physics.json）
//!
//! 每条 `physics_hair` 映射为两粒子的摆锤：根粒子跟随输入，
//! 末端粒子长度为 `length`，阻尼 `regist`，质量 `mass`。
//! 计时为毫秒，不支持风。

use std::f32::consts::PI;

use serde::Deserialize;

use crate::moc::CoreModel;
use crate::physics::{
    InputMapping, ParticleDef, PhysicsComponent, PhysicsInput, PhysicsOutput, PhysicsRig, PhysicsSettingDef,
};
use crate::Result;

/// 粒子延迟按毫秒换算
const MS_DELAY_SCALE: f32 = 1.0 / 1000.0;

#[derive(Deserialize)]
struct PhysicsJson {
    #[serde(default)]
    physics_hair: Vec<HairJson>,
}

#[derive(Deserialize)]
struct HairJson {
    setup: HairSetup,
    #[serde(default)]
    src: Vec<HairParam>,
    #[serde(default)]
    targets: Vec<HairParam>,
}

#[derive(Deserialize)]
struct HairSetup {
    length: f32,
    regist: f32,
    mass: f32,
}

#[derive(Deserialize)]
struct HairParam {
    id: String,
    ptype: String,
    scale: f32,
    weight: f32,
}

fn component(ptype: &str) -> PhysicsComponent {
    match ptype {
        "y" => PhysicsComponent::Y,
        "angle" => PhysicsComponent::Angle,
        _ => PhysicsComponent::X,
    }
}

/// 解析 physics.json
pub fn parse_physics2(bytes: &[u8]) -> Result<Vec<PhysicsSettingDef>> {
    let json: PhysicsJson = serde_json::from_slice(bytes)?;

    Ok(json
        .physics_hair
        .into_iter()
        .map(|hair| PhysicsSettingDef {
            inputs: hair
                .src
                .into_iter()
                .map(|s| PhysicsInput {
                    component: component(&s.ptype),
                    parameter_id: s.id,
                    weight: s.weight.max(0.0).min(1.0),
                    scale: s.scale,
                    reflect: false,
                })
                .collect(),
            outputs: hair
                .targets
                .into_iter()
                .map(|t| {
                    let component = component(&t.ptype);
                    // 摆锤输出弧度，Cubism2 目标按角度缩放
                    let scale = if component == PhysicsComponent::Angle {
                        t.scale * 180.0 / PI
                    } else {
                        t.scale
                    };
                    PhysicsOutput {
                        parameter_id: t.id,
                        vertex_index: 1,
                        component,
                        scale,
                        weight: t.weight.max(0.0).min(1.0),
                        reflect: false,
                    }
                })
                .collect(),
            particles: vec![
                ParticleDef {
                    mobility: 1.0,
                    delay: MS_DELAY_SCALE,
                    acceleration: 1.0,
                    radius: 0.0,
                },
                ParticleDef {
                    mobility: 1.0 - hair.setup.regist,
                    delay: MS_DELAY_SCALE,
                    acceleration: hair.setup.mass,
                    radius: hair.setup.length,
                },
            ],
            mapping: InputMapping::Direct,
        })
        .collect())
}

/// 构建不支持风的物理
pub fn physics2_rig(bytes: &[u8], core: &CoreModel) -> Result<PhysicsRig> {
    Ok(PhysicsRig::new(parse_physics2(bytes)?, core, false))
}
