use super::Extra;
use paddock_source::Participant;
use paddock_table::Scope;
use serde::{Deserialize, Serialize};

/// Response of the results endpoint. Only the per-simsession results are kept.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Subsession {
    pub session_results: Vec<SimSessionResult>,
}

/// Results of one simulated session (practice, qualifying, race) of a
/// subsession. Persisted as a single row with the placements nested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimSessionResult {
    pub simsession_number: i64,
    /// Not part of the API response at this level; set before persisting.
    #[serde(default)]
    pub subsession_id: Option<i64>,
    pub results: Vec<ResultRow>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A driver's or a team's placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cust_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}
impl ResultRow {
    /// Whose lap data to request for this placement, if the row carries the
    /// id the scope needs.
    pub fn participant(&self, scope: Scope) -> Option<Participant> {
        match scope {
            Scope::Individual => self.cust_id.map(Participant::Driver),
            Scope::Team => self.team_id.map(Participant::Team),
        }
    }
}
