use super::Extra;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub league_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_name: Option<String>,
    /// Members are persisted from the roster endpoint, never from here.
    #[serde(default, skip_serializing)]
    pub roster: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response envelope of the roster endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Roster {
    pub roster: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub cust_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_member_since: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
