use super::Extra;
use serde::{Deserialize, Serialize};

/// Response envelope of the seasons endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Seasons {
    pub seasons: Vec<Season>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_system_desc: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
