// Wire types for the fleet v1 HTTP API.
//
// Field names follow fleet's JSON schema. The registry client produces the
// same types from etcd records so both backends hand identical shapes to
// the capability layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Scheduling state of a unit, both desired and observed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JobState {
    Inactive,
    Loaded,
    Launched,
}

/// One `Name=Value` line of a unit file, tagged with its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A unit as the scheduler describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub name: String,
    #[serde(default)]
    pub options: Vec<UnitOption>,
    pub desired_state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<JobState>,
    /// Empty when the unit is not scheduled anywhere.
    #[serde(rename = "machineID", default, skip_serializing_if = "String::is_empty")]
    pub machine_id: String,
}

/// A cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    #[serde(rename = "primaryIP", default)]
    pub primary_ip: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// systemd's view of one unit on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitState {
    pub name: String,
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "machineID", default)]
    pub machine_id: String,
    #[serde(default)]
    pub systemd_load_state: String,
    #[serde(default)]
    pub systemd_active_state: String,
    #[serde(default)]
    pub systemd_sub_state: String,
}

// ── Envelopes ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MachinePage {
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnitPage {
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnitStatePage {
    #[serde(default)]
    pub states: Vec<UnitState>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Paged listing responses.
pub(crate) trait Page {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for MachinePage {
    type Item = Machine;
    fn into_parts(self) -> (Vec<Machine>, Option<String>) {
        (self.machines, self.next_page_token)
    }
}

impl Page for UnitPage {
    type Item = Unit;
    fn into_parts(self) -> (Vec<Unit>, Option<String>) {
        (self.units, self.next_page_token)
    }
}

impl Page for UnitStatePage {
    type Item = UnitState;
    fn into_parts(self) -> (Vec<UnitState>, Option<String>) {
        (self.states, self.next_page_token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn job_state_parses_case_insensitively() {
        assert_eq!("Launched".parse::<JobState>().unwrap(), JobState::Launched);
        assert_eq!(JobState::Loaded.to_string(), "loaded");
        assert!("running".parse::<JobState>().is_err());
    }

    #[test]
    fn unit_matches_fleet_json_shape() {
        let unit: Unit = serde_json::from_value(json!({
            "name": "web-1.service",
            "options": [
                { "section": "Service", "name": "ExecStart", "value": "/usr/bin/web" }
            ],
            "desiredState": "launched",
            "currentState": "loaded",
            "machineID": "2c5d4f3b"
        }))
        .unwrap();

        assert_eq!(unit.desired_state, JobState::Launched);
        assert_eq!(unit.current_state, Some(JobState::Loaded));
        assert_eq!(unit.machine_id, "2c5d4f3b");

        let unscheduled = Unit {
            current_state: None,
            machine_id: String::new(),
            ..unit
        };
        let value = serde_json::to_value(&unscheduled).unwrap();
        assert!(value.get("machineID").is_none());
        assert!(value.get("currentState").is_none());
        assert_eq!(value["options"][0]["section"], "Service");
    }
}
