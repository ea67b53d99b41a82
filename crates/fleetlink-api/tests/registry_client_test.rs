// Integration tests for `RegistryClient` against a wiremock etcd v2 keys API.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetlink_api::registry::{DEFAULT_KEY_PREFIX, LINKED_FLEET_VERSION};
use fleetlink_api::{EtcdKeys, JobState, RegistryClient, TransportConfig, Unit, UnitOption};
use fleetlink_api::unit_file;

const KEYS: &str = "/v2/keys/_coreos.com/fleet";

// ── Helpers ─────────────────────────────────────────────────────────

fn client_for(endpoints: &[String]) -> RegistryClient {
    let transport = TransportConfig::default().build().unwrap();
    let endpoints = endpoints.iter().map(|e| Url::parse(e).unwrap()).collect();
    RegistryClient::new(EtcdKeys::new(endpoints, transport), DEFAULT_KEY_PREFIX)
}

async fn setup() -> (MockServer, RegistryClient) {
    let server = MockServer::start().await;
    let client = client_for(&[server.uri()]);
    (server, client)
}

fn web_options() -> Vec<UnitOption> {
    vec![UnitOption::new("Service", "ExecStart", "/usr/bin/web")]
}

fn node(key: &str, value: &str) -> Value {
    json!({ "key": format!("/_coreos.com/fleet/{key}"), "value": value })
}

fn keys_response(action: &str, node: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "action": action, "node": node }))
}

fn etcd_error(status: u16, code: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "errorCode": code,
        "message": message,
        "cause": "/_coreos.com/fleet",
        "index": 42
    }))
}

fn machine(id: &str, version: &str) -> Value {
    json!({
        "key": format!("/_coreos.com/fleet/machines/{id}"),
        "dir": true,
        "nodes": [node(
            &format!("machines/{id}/object"),
            &json!({
                "ID": id,
                "PublicIP": "10.0.0.1",
                "Metadata": { "role": "web" },
                "Version": version
            })
            .to_string(),
        )]
    })
}

fn job_tree(name: &str, target: Option<&str>) -> Value {
    let hash: Vec<u8> = unit_file::hash(&web_options()).to_vec();
    let mut nodes = vec![
        node(
            &format!("job/{name}/object"),
            &json!({ "Name": name, "UnitHash": hash }).to_string(),
        ),
        node(&format!("job/{name}/target-state"), "launched"),
    ];
    if let Some(machine) = target {
        nodes.push(node(&format!("job/{name}/target"), machine));
    }
    json!({
        "key": format!("/_coreos.com/fleet/job/{name}"),
        "dir": true,
        "nodes": nodes
    })
}

async fn mount_unit_body(server: &MockServer) {
    let hash = hex::encode(unit_file::hash(&web_options()));
    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/unit/{hash}")))
        .respond_with(keys_response(
            "get",
            node(
                &format!("unit/{hash}"),
                &json!({ "Raw": unit_file::serialize(&web_options()) }).to_string(),
            ),
        ))
        .mount(server)
        .await;
}

// ── Machines & versions ─────────────────────────────────────────────

#[tokio::test]
async fn test_list_machines_and_latest_version() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/machines")))
        .and(query_param("recursive", "true"))
        .respond_with(keys_response(
            "get",
            json!({
                "key": "/_coreos.com/fleet/machines",
                "dir": true,
                "nodes": [machine("m1", "0.10.2"), machine("m2", "0.11.1"), machine("m3", "bogus")]
            }),
        ))
        .mount(&server)
        .await;

    let machines = client.list_machines().await.unwrap();
    assert_eq!(machines.len(), 3);
    assert_eq!(machines[0].id, "m1");
    assert_eq!(machines[0].primary_ip, "10.0.0.1");
    assert_eq!(machines[0].metadata["role"], "web");

    let latest = client.latest_daemon_version().await.unwrap().unwrap();
    assert_eq!(latest.to_string(), "0.11.1");
    assert!(client.check_version().await.unwrap().is_none());
}

#[tokio::test]
async fn test_newer_cluster_version_yields_warning() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/machines")))
        .respond_with(keys_response(
            "get",
            json!({
                "key": "/_coreos.com/fleet/machines",
                "dir": true,
                "nodes": [machine("m1", "99.0.0")]
            }),
        ))
        .mount(&server)
        .await;

    let warning = client.check_version().await.unwrap().unwrap();
    assert_eq!(warning.linked.to_string(), LINKED_FLEET_VERSION);
    assert_eq!(warning.latest.to_string(), "99.0.0");

    let client = client.with_version_warning(warning);
    assert!(client.version_warning().unwrap().to_string().contains("WARNING"));
}

#[tokio::test]
async fn test_empty_registry_has_no_machines() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/machines")))
        .respond_with(etcd_error(404, 100, "Key not found"))
        .mount(&server)
        .await;

    assert!(client.list_machines().await.unwrap().is_empty());
    assert!(client.latest_daemon_version().await.unwrap().is_none());
}

// ── Units ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_unit_writes_body_job_and_target_state() {
    let (server, client) = setup().await;
    let hash = hex::encode(unit_file::hash(&web_options()));

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/unit/{hash}")))
        .and(body_string_contains("value="))
        .respond_with(keys_response("set", node(&format!("unit/{hash}"), "{}")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/job/web-1/object")))
        .and(query_param("prevExist", "false"))
        .respond_with(keys_response("create", node("job/web-1/object", "{}")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/job/web-1/target-state")))
        .and(body_string_contains("value=launched"))
        .respond_with(keys_response("set", node("job/web-1/target-state", "launched")))
        .expect(1)
        .mount(&server)
        .await;

    let unit = Unit {
        name: "web-1".into(),
        options: web_options(),
        desired_state: JobState::Launched,
        current_state: None,
        machine_id: String::new(),
    };
    client.create_unit(&unit).await.unwrap();
}

#[tokio::test]
async fn test_create_existing_job_conflicts() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "{KEYS}/unit/{}",
            hex::encode(unit_file::hash(&web_options()))
        )))
        .respond_with(keys_response("set", node("unit/x", "{}")))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/job/web-1/object")))
        .respond_with(etcd_error(412, 105, "Key already exists"))
        .mount(&server)
        .await;

    let unit = Unit {
        name: "web-1".into(),
        options: web_options(),
        desired_state: JobState::Launched,
        current_state: None,
        machine_id: String::new(),
    };
    let err = client.create_unit(&unit).await.unwrap_err();

    assert!(err.is_conflict());
    assert!(err.to_string().contains("job web-1 already exists"));
}

#[tokio::test]
async fn test_get_unit_reports_launched_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/job/web-1")))
        .and(query_param("recursive", "true"))
        .respond_with(keys_response("get", job_tree("web-1", Some("m1"))))
        .mount(&server)
        .await;
    mount_unit_body(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/state/web-1/m1")))
        .respond_with(keys_response(
            "get",
            node(
                "state/web-1/m1",
                &json!({
                    "loadState": "loaded",
                    "activeState": "active",
                    "subState": "running",
                    "machineState": { "ID": "m1" },
                    "unitHash": "abc"
                })
                .to_string(),
            ),
        ))
        .mount(&server)
        .await;

    let unit = client.get_unit("web-1").await.unwrap().unwrap();

    assert_eq!(unit.name, "web-1");
    assert_eq!(unit.desired_state, JobState::Launched);
    assert_eq!(unit.current_state, Some(JobState::Launched));
    assert_eq!(unit.machine_id, "m1");
    assert_eq!(unit.options, web_options());
}

#[tokio::test]
async fn test_unscheduled_unit_is_inactive() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/job/web-1")))
        .respond_with(keys_response("get", job_tree("web-1", None)))
        .mount(&server)
        .await;
    mount_unit_body(&server).await;

    let unit = client.get_unit("web-1").await.unwrap().unwrap();
    assert_eq!(unit.current_state, Some(JobState::Inactive));
    assert!(unit.machine_id.is_empty());
}

#[tokio::test]
async fn test_missing_unit_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/job/ghost")))
        .respond_with(etcd_error(404, 100, "Key not found"))
        .mount(&server)
        .await;

    assert!(client.get_unit("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_units_joins_reported_states() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/job")))
        .respond_with(keys_response(
            "get",
            json!({
                "key": "/_coreos.com/fleet/job",
                "dir": true,
                "nodes": [job_tree("a", Some("m1")), job_tree("b", Some("m2"))]
            }),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/state")))
        .respond_with(keys_response(
            "get",
            json!({
                "key": "/_coreos.com/fleet/state",
                "dir": true,
                "nodes": [{
                    "key": "/_coreos.com/fleet/state/a",
                    "dir": true,
                    "nodes": [node(
                        "state/a/m1",
                        &json!({ "loadState": "loaded", "activeState": "inactive", "subState": "dead" })
                            .to_string()
                    )]
                }]
            }),
        ))
        .mount(&server)
        .await;
    mount_unit_body(&server).await;

    let units = client.list_units().await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].current_state, Some(JobState::Loaded));
    assert_eq!(units[1].current_state, Some(JobState::Inactive));

    let states = client.list_unit_states().await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].name, "a");
    assert_eq!(states[0].machine_id, "m1");
    assert_eq!(states[0].systemd_sub_state, "dead");
}

#[tokio::test]
async fn test_set_state_and_destroy() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/job/web-1/target-state")))
        .and(query_param("prevExist", "true"))
        .and(body_string_contains("value=loaded"))
        .respond_with(keys_response("update", node("job/web-1/target-state", "loaded")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{KEYS}/job/web-1")))
        .and(query_param("recursive", "true"))
        .respond_with(keys_response("delete", json!({ "key": "/_coreos.com/fleet/job/web-1", "dir": true })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_unit_desired_state("web-1", JobState::Loaded)
        .await
        .unwrap();
    client.destroy_unit("web-1").await.unwrap();
}

#[tokio::test]
async fn test_operations_on_missing_job_are_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path(format!("{KEYS}/job/ghost/target-state")))
        .respond_with(etcd_error(404, 100, "Key not found"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{KEYS}/job/ghost")))
        .respond_with(etcd_error(404, 100, "Key not found"))
        .mount(&server)
        .await;

    let err = client
        .set_unit_desired_state("ghost", JobState::Launched)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = client.destroy_unit("ghost").await.unwrap_err();
    assert!(err.is_not_found());
}

// ── Failover ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_endpoint_fails_over() {
    let server = MockServer::start().await;
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = client_for(&[dead, server.uri()]);

    Mock::given(method("GET"))
        .and(path(format!("{KEYS}/machines")))
        .respond_with(keys_response(
            "get",
            json!({ "key": "/_coreos.com/fleet/machines", "dir": true, "nodes": [machine("m1", "0.11.5")] }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let machines = client.list_machines().await.unwrap();
    assert_eq!(machines[0].id, "m1");
}

#[tokio::test]
async fn test_all_endpoints_unreachable_is_connect_error() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = client_for(&[dead]);

    let err = client.list_machines().await.unwrap_err();
    assert!(err.is_connect(), "expected connect error, got {err:?}");
}
