use serde::Serialize;

use crate::params::{color_param, object_param, str_param, usize_param, ParamMap};

/// Recognized fields of a simple-parameter LLM answer. Unrecognized keys
/// are ignored; each field accepts snake_case and camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sky_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambient_light: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particle_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_transform: Option<ParamMap>,
}

impl SceneParameters {
    pub fn from_json(map: &ParamMap) -> Self {
        Self {
            sky_color: color_param(map, &["sky_color", "skyColor"]),
            ground_color: color_param(map, &["ground_color", "groundColor"]),
            ambient_light: color_param(map, &["ambient_light", "ambientLight", "ambient_light_color"]),
            tree_type: str_param(map, &["tree_type", "treeType"]),
            tree_count: usize_param(map, &["tree_count", "treeCount"]),
            building_type: str_param(map, &["building_type", "buildingType"]),
            weather_effect: str_param(map, &["weather_effect", "weatherEffect", "weather"]),
            particle_effect: str_param(map, &["particle_effect", "particleEffect", "particles"]),
            player_color: color_param(map, &["player_color", "playerColor"]),
            tree_transform: object_param(map, &["tree_transform", "treeTransform"]).cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
