//! 核心模型
//!
//! 参数表、部件和可绘制网格的运行时表示，两种格式共用。

mod data;
mod deform;
mod model;

pub use data::{BlendMode, CanvasInfo, DeformerData, DrawableData, MocData, PartData, ParameterData};
pub use deform::{deform_drawable, locate_key};
pub use model::CoreModel;
