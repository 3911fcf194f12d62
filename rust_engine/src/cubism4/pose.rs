//! pose3.json

use serde::Deserialize;

use crate::model::{Pose, PosePart, DEFAULT_POSE_FADE_TIME};
use crate::Result;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Pose3Json {
    #[serde(default)]
    fade_in_time: Option<f32>,
    #[serde(default)]
    groups: Vec<Vec<PosePart3>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PosePart3 {
    id: String,
    #[serde(default)]
    link: Vec<String>,
}

/// 解析 pose3.json，淡入时间为秒
///
/// 部件可见性由与部件同名的参数控制。
pub fn parse_pose3(bytes: &[u8]) -> Result<Pose> {
    let json: Pose3Json = serde_json::from_slice(bytes)?;
    let groups = json
        .groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|p| PosePart {
                    parameter_id: p.id.clone(),
                    part_id: p.id,
                    links: p.link,
                })
                .collect()
        })
        .collect();
    Ok(Pose::new(groups, json.fade_in_time.unwrap_or(DEFAULT_POSE_FADE_TIME)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pose3() {
        let json = br#"{
            "Type": "Live2D Pose",
            "FadeInTime": 0.3,
            "Groups": [
                [ { "Id": "PartArmA", "Link": ["PartHandA"] }, { "Id": "PartArmB", "Link": [] } ],
                [ { "Id": "PartHat" } ]
            ]
        }"#;
        let pose = parse_pose3(json).unwrap();
        assert_eq!(pose.group_count(), 2);
        assert_eq!(pose.fade_time(), 0.3);
    }

    #[test]
    fn test_default_fade() {
        let pose = parse_pose3(br#"{ "Groups": [] }"#).unwrap();
        assert_eq!(pose.fade_time(), DEFAULT_POSE_FADE_TIME);
    }
}
