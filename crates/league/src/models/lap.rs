use super::Extra;
use paddock_source::Participant;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lap and incident events of one participant in one simsession.
///
/// The source stitches chunked responses into `_chunk_data`; the events are
/// persisted as `events` and the chunk descriptor is dropped. The response
/// does not repeat the request key, so [`LapData::keyed`] sets it before the
/// record is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapData {
    #[serde(default)]
    pub subsession_id: Option<i64>,
    #[serde(default)]
    pub simsession_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cust_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(default, rename(deserialize = "_chunk_data"))]
    pub events: Option<Vec<Value>>,
    #[serde(default, skip_serializing)]
    pub chunk_info: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LapData {
    /// Tags the record with the subsession, simsession and participant it
    /// was requested for.
    pub fn keyed(mut self, subsession_id: i64, simsession_number: i64, participant: Participant) -> Self {
        self.subsession_id = Some(subsession_id);
        self.simsession_number = Some(simsession_number);
        match participant {
            Participant::Driver(id) => self.cust_id = Some(id),
            Participant::Team(id) => self.team_id = Some(id),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunks_become_events() {
        let laps: LapData = serde_json::from_value(json!({
            "chunk_info": {"base_download_url": "https://example.com/", "chunk_file_names": ["a.json"]},
            "_chunk_data": [{"lap_number": 1}, {"lap_number": 2}],
            "best_lap_num": 2,
        }))
        .unwrap();
        let persisted = serde_json::to_value(laps.keyed(555, -1, Participant::Driver(42))).unwrap();
        assert_eq!(persisted, json!({
            "subsession_id": 555,
            "simsession_number": -1,
            "cust_id": 42,
            "events": [{"lap_number": 1}, {"lap_number": 2}],
            "best_lap_num": 2,
        }));
    }

    #[test]
    fn test_team_key() {
        let laps: LapData = serde_json::from_value(json!({"_chunk_data": []})).unwrap();
        let persisted = serde_json::to_value(laps.keyed(777, 0, Participant::Team(-5))).unwrap();
        assert_eq!(persisted["subsession_id"], json!(777));
        assert_eq!(persisted["simsession_number"], json!(0));
        assert_eq!(persisted["team_id"], json!(-5));
        assert!(persisted.get("cust_id").is_none());
    }

    #[test]
    fn test_unchunked_response_has_null_events() {
        let laps: LapData = serde_json::from_value(json!({"best_lap_num": 0})).unwrap();
        assert_eq!(serde_json::to_value(&laps).unwrap()["events"], Value::Null);
    }
}
