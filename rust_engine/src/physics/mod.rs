//! 物理系统
//!
//! 两种格式共用同一套摆锤积分：
//! - Cubism4：physics3.json，归一化输入，支持风
//! - Cubism2：physics.json 头发设置，直接输入，不支持风

mod normalize;
mod rig;

pub use normalize::{direction_to_radian, normalize_parameter_value, radian_to_direction, NormalizationRange};
pub use rig::{
    InputMapping, ParticleDef, PhysicsComponent, PhysicsInput, PhysicsOutput, PhysicsRig, PhysicsSettingDef,
};
