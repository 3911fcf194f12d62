//! Cubism2 姿势（pose.json）

use serde::Deserialize;

use crate::model::{Pose, PosePart};
use crate::Result;

/// 淡入时间（毫秒）
pub const POSE2_FADE_TIME: f32 = 500.0;

#[derive(Deserialize)]
struct PoseJson {
    #[serde(default)]
    parts_visible: Vec<PoseGroupJson>,
}

#[derive(Deserialize)]
struct PoseGroupJson {
    #[serde(default)]
    group: Vec<PosePartJson>,
}

#[derive(Deserialize)]
struct PosePartJson {
    id: String,
    #[serde(default)]
    link: Vec<String>,
}

/// 解析 pose.json，可见性参数为 `VISIBLE:` + 部件 id
pub fn parse_pose2(bytes: &[u8]) -> Result<Pose> {
    let json: PoseJson = serde_json::from_slice(bytes)?;
    let groups = json
        .parts_visible
        .into_iter()
        .map(|g| {
            g.group
                .into_iter()
                .map(|p| PosePart {
                    parameter_id: format!("VISIBLE:{}", p.id),
                    part_id: p.id,
                    links: p.link,
                })
                .collect()
        })
        .collect();
    Ok(Pose::new(groups, POSE2_FADE_TIME))
}
