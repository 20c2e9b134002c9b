use super::Extra;
use paddock_table::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope of the season sessions endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SeasonSessions {
    pub sessions: Vec<Session>,
}

/// One scheduled league session.
///
/// Sessions that have not run yet may lack a subsession id; one is required
/// once `has_results` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsession_id: Option<i64>,
    /// Filled in from the requested season when the API leaves it out.
    #[serde(default)]
    pub league_season_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_at: Option<String>,
    pub has_results: bool,
    pub driver_changes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<Value>,
    /// Forecast data changes shape between sessions; never persisted.
    #[serde(default, skip_serializing)]
    pub weather: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}
impl Session {
    /// Result lineage, fixed by whether the session allowed driver changes.
    pub fn scope(&self) -> Scope {
        Scope::from_driver_changes(self.driver_changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weather_is_stripped() {
        let session: Session = serde_json::from_value(json!({
            "subsession_id": 555,
            "has_results": true,
            "driver_changes": false,
            "weather": {"temp_value": 21},
            "entry_count": 18,
        }))
        .unwrap();
        assert!(session.weather.is_some());
        let persisted = serde_json::to_value(&session).unwrap();
        assert!(persisted.get("weather").is_none());
        assert_eq!(persisted["entry_count"], json!(18));
        assert_eq!(persisted["league_season_id"], Value::Null);
    }

    #[test]
    fn test_scope() {
        let mut session: Session = serde_json::from_value(json!({
            "has_results": false,
            "driver_changes": true,
        }))
        .unwrap();
        assert_eq!(session.scope(), Scope::Team);
        session.driver_changes = false;
        assert_eq!(session.scope(), Scope::Individual);
    }

    #[test]
    fn test_flags_are_required() {
        let missing = json!({"subsession_id": 555, "has_results": true});
        assert!(serde_json::from_value::<Session>(missing).is_err());
        let mistyped = json!({"subsession_id": 555, "has_results": "yes", "driver_changes": false});
        assert!(serde_json::from_value::<Session>(mistyped).is_err());
    }
}
