// Integration tests for `FleetHttpClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetlink_api::{Error, FleetHttpClient, JobState, TransportConfig, Unit, UnitOption};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FleetHttpClient) {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().build().unwrap();
    let endpoint = Url::parse(&server.uri()).unwrap();
    let client = FleetHttpClient::new(&endpoint, transport).unwrap();
    (server, client)
}

fn web_unit() -> Unit {
    Unit {
        name: "web-1.service".into(),
        options: vec![UnitOption::new("Service", "ExecStart", "/usr/bin/web")],
        desired_state: JobState::Launched,
        current_state: None,
        machine_id: String::new(),
    }
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_base_url_gets_api_prefix() {
    let (server, client) = setup().await;
    assert_eq!(
        client.base_url().as_str(),
        format!("{}/fleet/v1/", server.uri())
    );

    let already = Url::parse("http://10.0.0.5:49153/fleet/v1").unwrap();
    let client = FleetHttpClient::new(&already, TransportConfig::default().build().unwrap())
        .unwrap();
    assert_eq!(client.base_url().as_str(), "http://10.0.0.5:49153/fleet/v1/");
}

#[tokio::test]
async fn test_list_machines_follows_pagination() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/machines"))
        .and(query_param("nextPageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [{ "id": "m2", "primaryIP": "10.0.0.2" }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [{
                "id": "m1",
                "primaryIP": "10.0.0.1",
                "metadata": { "region": "us-east" }
            }],
            "nextPageToken": "page-2"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let machines = client.list_machines().await.unwrap();

    assert_eq!(machines.len(), 2);
    assert_eq!(machines[0].id, "m1");
    assert_eq!(machines[0].metadata["region"], "us-east");
    assert_eq!(machines[1].primary_ip, "10.0.0.2");
}

#[tokio::test]
async fn test_get_unit() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/units/web-1.service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "web-1.service",
            "options": [
                { "section": "Service", "name": "ExecStart", "value": "/usr/bin/web" }
            ],
            "desiredState": "launched",
            "currentState": "loaded",
            "machineID": "m1"
        })))
        .mount(&server)
        .await;

    let unit = client.get_unit("web-1.service").await.unwrap().unwrap();

    assert_eq!(unit.desired_state, JobState::Launched);
    assert_eq!(unit.current_state, Some(JobState::Loaded));
    assert_eq!(unit.machine_id, "m1");
    assert_eq!(unit.options, web_unit().options);
}

#[tokio::test]
async fn test_get_missing_unit_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/units/ghost.service"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "unit does not exist" }
        })))
        .mount(&server)
        .await;

    assert!(client.get_unit("ghost.service").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_units_and_states() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/units"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "units": [
                { "name": "a.service", "desiredState": "loaded" },
                { "name": "b.service", "desiredState": "inactive" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "states": [{
                "name": "a.service",
                "hash": "abc123",
                "machineID": "m1",
                "systemdLoadState": "loaded",
                "systemdActiveState": "active",
                "systemdSubState": "running"
            }]
        })))
        .mount(&server)
        .await;

    let units = client.list_units().await.unwrap();
    assert_eq!(
        units.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
        ["a.service", "b.service"]
    );

    let states = client.list_unit_states().await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].systemd_sub_state, "running");
    assert_eq!(states[0].machine_id, "m1");
}

#[tokio::test]
async fn test_create_unit_puts_full_definition() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/fleet/v1/units/web-1.service"))
        .and(body_json(json!({
            "name": "web-1.service",
            "options": [
                { "section": "Service", "name": "ExecStart", "value": "/usr/bin/web" }
            ],
            "desiredState": "launched"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client.create_unit(&web_unit()).await.unwrap();
}

#[tokio::test]
async fn test_set_desired_state_and_destroy() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/fleet/v1/units/web-1.service"))
        .and(body_json(json!({ "name": "web-1.service", "desiredState": "inactive" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/fleet/v1/units/web-1.service"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_unit_desired_state("web-1.service", JobState::Inactive)
        .await
        .unwrap();
    client.destroy_unit("web-1.service").await.unwrap();
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_conflict_error_body_is_surfaced() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/fleet/v1/units/web-1.service"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": 409, "message": "unit already exists" }
        })))
        .mount(&server)
        .await;

    let err = client.create_unit(&web_unit()).await.unwrap_err();

    assert!(err.is_conflict());
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "unit already exists");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_destroy_missing_unit_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/fleet/v1/units/ghost.service"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client.destroy_unit("ghost.service").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/fleet/v1/units"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client.list_units().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body.contains("proxy")));
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        timeout: Duration::from_millis(100),
        ..TransportConfig::default()
    }
    .build()
    .unwrap();
    let client = FleetHttpClient::new(&Url::parse(&server.uri()).unwrap(), transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/fleet/v1/machines"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "machines": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.list_machines().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(matches!(err, Error::Timeout { .. }));
}
