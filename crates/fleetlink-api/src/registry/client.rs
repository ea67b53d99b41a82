// fleet's registry, read and written directly in etcd.
//
// Key layout under the prefix:
//   machines/<id>/object        machine record, including daemon Version
//   job/<name>/object           {"Name", "UnitHash"}
//   job/<name>/target-state     desired JobState
//   job/<name>/target           machine the job is scheduled to
//   unit/<sha1-hex>             {"Raw": unit file text}
//   state/<name>/<machine>      systemd state reported by that machine

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::etcd::{ERROR_CODE_NODE_EXIST, EtcdKeys, Node, PrevExist};
use super::version::{DaemonVersion, VersionMismatch};
use crate::error::Error;
use crate::models::{JobState, Machine, Unit, UnitOption, UnitState};
use crate::unit_file;

/// Default keyspace for fleet data.
pub const DEFAULT_KEY_PREFIX: &str = "/_coreos.com/fleet/";

// ── Stored records ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MachineRecord {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "PublicIP", default)]
    public_ip: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobRecord {
    name: String,
    unit_hash: [u8; 20],
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UnitRecord {
    raw: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitStateRecord {
    #[serde(default, alias = "LoadState")]
    load_state: String,
    #[serde(default, alias = "ActiveState")]
    active_state: String,
    #[serde(default, alias = "SubState")]
    sub_state: String,
    #[serde(default, alias = "UnitHash")]
    unit_hash: String,
}

/// Scheduler state derived from a job's target and its reported systemd
/// state.
fn current_state(machine_id: &str, reported: Option<&UnitStateRecord>) -> JobState {
    if machine_id.is_empty() {
        return JobState::Inactive;
    }
    match reported {
        None => JobState::Inactive,
        Some(r) if r.active_state == "active" => JobState::Launched,
        Some(_) => JobState::Loaded,
    }
}

struct JobEntry {
    name: String,
    hash_hex: String,
    desired_state: JobState,
    machine_id: String,
}

type StateIndex = HashMap<(String, String), UnitStateRecord>;

// ── Client ───────────────────────────────────────────────────────────

/// Unit operations against fleet's etcd keyspace.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    keys: EtcdKeys,
    prefix: String,
    version_warning: Option<VersionMismatch>,
}

impl RegistryClient {
    pub fn new(keys: EtcdKeys, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            "/".to_owned()
        } else {
            format!("/{trimmed}/")
        };
        Self {
            keys,
            prefix,
            version_warning: None,
        }
    }

    pub fn keys(&self) -> &EtcdKeys {
        &self.keys
    }

    /// Warning recorded by the last version check, if the cluster runs a
    /// newer fleet.
    pub fn version_warning(&self) -> Option<&VersionMismatch> {
        self.version_warning.as_ref()
    }

    pub fn with_version_warning(mut self, warning: VersionMismatch) -> Self {
        self.version_warning = Some(warning);
        self
    }

    fn path(&self, parts: &[&str]) -> String {
        format!("{}{}", self.prefix, parts.join("/"))
    }

    // ── Machines & versions ──────────────────────────────────────────

    async fn machine_records(&self) -> Result<Vec<MachineRecord>, Error> {
        let Some(root) = self.keys.get(&self.path(&["machines"]), true).await? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for machine in root.nodes.iter().filter(|n| n.dir) {
            let Some(object) = machine.child("object") else {
                continue;
            };
            records.push(decode_value::<MachineRecord>(object)?);
        }
        Ok(records)
    }

    pub async fn list_machines(&self) -> Result<Vec<Machine>, Error> {
        Ok(self
            .machine_records()
            .await?
            .into_iter()
            .map(|r| Machine {
                id: r.id,
                primary_ip: r.public_ip,
                metadata: r.metadata,
            })
            .collect())
    }

    /// Highest daemon version any registered machine reports.
    pub async fn latest_daemon_version(&self) -> Result<Option<DaemonVersion>, Error> {
        let mut latest: Option<DaemonVersion> = None;
        for record in self.machine_records().await? {
            match record.version.parse::<DaemonVersion>() {
                Ok(version) => {
                    if latest.as_ref().is_none_or(|l| version > *l) {
                        latest = Some(version);
                    }
                }
                Err(e) => debug!(machine = %record.id, error = %e, "skipping machine version"),
            }
        }
        Ok(latest)
    }

    /// Compare the cluster's newest daemon with the linked client version.
    pub async fn check_version(&self) -> Result<Option<VersionMismatch>, Error> {
        Ok(self
            .latest_daemon_version()
            .await?
            .and_then(|latest| VersionMismatch::check(DaemonVersion::linked(), latest)))
    }

    // ── Jobs ─────────────────────────────────────────────────────────

    fn parse_job(job: &Node) -> Result<JobEntry, Error> {
        let object = job.child("object").ok_or_else(|| Error::CorruptEntry {
            key: job.key.clone(),
            reason: "job has no object".into(),
        })?;
        let record: JobRecord = decode_value(object)?;

        let desired_state = match job.child("target-state").and_then(|n| n.value.as_deref()) {
            Some(text) => text.parse().map_err(|_| Error::CorruptEntry {
                key: format!("{}/target-state", job.key),
                reason: format!("unknown job state {text:?}"),
            })?,
            None => JobState::Inactive,
        };
        let machine_id = job
            .child("target")
            .and_then(|n| n.value.clone())
            .unwrap_or_default();

        Ok(JobEntry {
            name: record.name,
            hash_hex: hex::encode(record.unit_hash),
            desired_state,
            machine_id,
        })
    }

    async fn unit_options(&self, hash_hex: &str) -> Result<Vec<UnitOption>, Error> {
        let key = self.path(&["unit", hash_hex]);
        let node = self
            .keys
            .get(&key, false)
            .await?
            .ok_or_else(|| Error::CorruptEntry {
                key: key.clone(),
                reason: "unit body missing".into(),
            })?;
        let record: UnitRecord = decode_value(&node)?;
        unit_file::parse(&record.raw)
    }

    async fn state_index(&self) -> Result<StateIndex, Error> {
        let mut index = HashMap::new();
        let Some(root) = self.keys.get(&self.path(&["state"]), true).await? else {
            return Ok(index);
        };
        for unit in root.nodes.iter().filter(|n| n.dir) {
            for machine in &unit.nodes {
                let record: UnitStateRecord = decode_value(machine)?;
                index.insert((unit.name().to_owned(), machine.name().to_owned()), record);
            }
        }
        Ok(index)
    }

    async fn reported_state(
        &self,
        name: &str,
        machine_id: &str,
    ) -> Result<Option<UnitStateRecord>, Error> {
        if machine_id.is_empty() {
            return Ok(None);
        }
        match self.keys.get(&self.path(&["state", name, machine_id]), false).await? {
            Some(node) => decode_value(&node).map(Some),
            None => Ok(None),
        }
    }

    fn build_unit(
        entry: JobEntry,
        options: Vec<UnitOption>,
        reported: Option<&UnitStateRecord>,
    ) -> Unit {
        Unit {
            current_state: Some(current_state(&entry.machine_id, reported)),
            name: entry.name,
            options,
            desired_state: entry.desired_state,
            machine_id: entry.machine_id,
        }
    }

    pub async fn get_unit(&self, name: &str) -> Result<Option<Unit>, Error> {
        let Some(job) = self.keys.get(&self.path(&["job", name]), true).await? else {
            return Ok(None);
        };
        let entry = Self::parse_job(&job)?;
        let options = self.unit_options(&entry.hash_hex).await?;
        let reported = self.reported_state(&entry.name, &entry.machine_id).await?;
        Ok(Some(Self::build_unit(entry, options, reported.as_ref())))
    }

    pub async fn list_units(&self) -> Result<Vec<Unit>, Error> {
        let Some(root) = self.keys.get(&self.path(&["job"]), true).await? else {
            return Ok(Vec::new());
        };
        let states = self.state_index().await?;
        let mut bodies: HashMap<String, Vec<UnitOption>> = HashMap::new();
        let mut units = Vec::new();

        for job in root.nodes.iter().filter(|n| n.dir) {
            let entry = Self::parse_job(job)?;
            let options = match bodies.get(&entry.hash_hex) {
                Some(options) => options.clone(),
                None => {
                    let options = self.unit_options(&entry.hash_hex).await?;
                    bodies.insert(entry.hash_hex.clone(), options.clone());
                    options
                }
            };
            let reported = states.get(&(entry.name.clone(), entry.machine_id.clone()));
            units.push(Self::build_unit(entry, options, reported));
        }
        Ok(units)
    }

    pub async fn list_unit_states(&self) -> Result<Vec<UnitState>, Error> {
        let mut states: Vec<UnitState> = self
            .state_index()
            .await?
            .into_iter()
            .map(|((name, machine_id), r)| UnitState {
                name,
                hash: r.unit_hash,
                machine_id,
                systemd_load_state: r.load_state,
                systemd_active_state: r.active_state,
                systemd_sub_state: r.sub_state,
            })
            .collect();
        states.sort_by(|a, b| (&a.name, &a.machine_id).cmp(&(&b.name, &b.machine_id)));
        Ok(states)
    }

    pub async fn set_unit_desired_state(&self, name: &str, state: JobState) -> Result<(), Error> {
        let key = self.path(&["job", name, "target-state"]);
        self.keys
            .set(&key, &state.to_string(), PrevExist::MustExist)
            .await
            .map(drop)
    }

    pub async fn create_unit(&self, unit: &Unit) -> Result<(), Error> {
        let hash = unit_file::hash(&unit.options);
        let body = encode(&UnitRecord {
            raw: unit_file::serialize(&unit.options),
        })?;
        self.keys
            .set(&self.path(&["unit", &hex::encode(hash)]), &body, PrevExist::Any)
            .await?;

        let job_key = self.path(&["job", &unit.name, "object"]);
        let job = encode(&JobRecord {
            name: unit.name.clone(),
            unit_hash: hash,
        })?;
        match self.keys.set(&job_key, &job, PrevExist::MustNotExist).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                return Err(Error::Registry {
                    code: ERROR_CODE_NODE_EXIST,
                    message: format!("job {} already exists", unit.name),
                    cause: Some(job_key),
                });
            }
            Err(e) => return Err(e),
        }

        self.keys
            .set(
                &self.path(&["job", &unit.name, "target-state"]),
                &unit.desired_state.to_string(),
                PrevExist::Any,
            )
            .await
            .map(drop)
    }

    pub async fn destroy_unit(&self, name: &str) -> Result<(), Error> {
        self.keys.delete(&self.path(&["job", name]), true).await
    }
}

fn decode_value<T: serde::de::DeserializeOwned>(node: &Node) -> Result<T, Error> {
    let value = node.value.as_deref().unwrap_or_default();
    serde_json::from_str(value).map_err(|e| Error::CorruptEntry {
        key: node.key.clone(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::Deserialization {
        message: format!("failed to encode registry record: {e}"),
        body: String::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reported(active: &str) -> UnitStateRecord {
        serde_json::from_value(serde_json::json!({
            "loadState": "loaded",
            "activeState": active,
            "subState": "running"
        }))
        .unwrap()
    }

    #[test]
    fn current_state_follows_target_and_report() {
        assert_eq!(current_state("", Some(&reported("active"))), JobState::Inactive);
        assert_eq!(current_state("m1", None), JobState::Inactive);
        assert_eq!(current_state("m1", Some(&reported("active"))), JobState::Launched);
        assert_eq!(current_state("m1", Some(&reported("failed"))), JobState::Loaded);
    }

    #[test]
    fn job_record_stores_hash_as_byte_array() {
        let json = encode(&JobRecord {
            name: "web.service".into(),
            unit_hash: [7; 20],
        })
        .unwrap();
        assert!(json.starts_with(r#"{"Name":"web.service","UnitHash":[7,7,"#));
    }

    #[test]
    fn state_record_accepts_both_key_styles() {
        let record: UnitStateRecord = serde_json::from_str(
            r#"{"LoadState":"loaded","ActiveState":"active","SubState":"running","UnitHash":"ab"}"#,
        )
        .unwrap();
        assert_eq!(record.active_state, "active");
        assert_eq!(record.unit_hash, "ab");
    }

    #[test]
    fn parse_job_defaults_missing_fields() {
        let job: Node = serde_json::from_value(serde_json::json!({
            "key": "/_coreos.com/fleet/job/web.service",
            "dir": true,
            "nodes": [{
                "key": "/_coreos.com/fleet/job/web.service/object",
                "value": encode(&JobRecord { name: "web.service".into(), unit_hash: [0; 20] }).unwrap()
            }]
        }))
        .unwrap();

        let entry = RegistryClient::parse_job(&job).unwrap();
        assert_eq!(entry.desired_state, JobState::Inactive);
        assert!(entry.machine_id.is_empty());
        assert_eq!(entry.hash_hex, "0".repeat(40));
    }

    #[test]
    fn parse_job_rejects_missing_object() {
        let job = Node {
            key: "/p/job/x".into(),
            dir: true,
            ..Node::default()
        };
        assert!(matches!(
            RegistryClient::parse_job(&job),
            Err(Error::CorruptEntry { .. })
        ));
    }
}
