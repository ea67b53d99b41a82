// Placeholder client for when there is nothing to connect to yet.
//
// During planning the endpoint may depend on infrastructure that does not
// exist yet. Nothing should call into the cluster at that point, so every
// operation fails immediately without touching the network.

use crate::capability::UnitApi;
use crate::error::CoreError;
use crate::model::{JobState, Machine, Unit, UnitState};

/// A client with no connection behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullClient;

fn not_connected<T>(operation: &'static str) -> Result<T, CoreError> {
    Err(CoreError::NotConnected { operation })
}

impl UnitApi for NullClient {
    async fn list_machines(&self) -> Result<Vec<Machine>, CoreError> {
        not_connected("list machines")
    }

    async fn get_unit(&self, _name: &str) -> Result<Option<Unit>, CoreError> {
        not_connected("get unit")
    }

    async fn list_units(&self) -> Result<Vec<Unit>, CoreError> {
        not_connected("list units")
    }

    async fn list_unit_states(&self) -> Result<Vec<UnitState>, CoreError> {
        not_connected("list unit states")
    }

    async fn set_unit_desired_state(&self, _name: &str, _state: JobState) -> Result<(), CoreError> {
        not_connected("set unit desired state")
    }

    async fn create_unit(&self, _unit: &Unit) -> Result<(), CoreError> {
        not_connected("create unit")
    }

    async fn destroy_unit(&self, _name: &str) -> Result<(), CoreError> {
        not_connected("destroy unit")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_operation_fails_with_its_name() {
        let client = NullClient;
        let unit = Unit::new("web-1", JobState::Launched);

        let errors = [
            client.list_machines().await.unwrap_err(),
            client.get_unit("web-1").await.unwrap_err(),
            client.list_units().await.unwrap_err(),
            client.list_unit_states().await.unwrap_err(),
            client
                .set_unit_desired_state("web-1", JobState::Loaded)
                .await
                .unwrap_err(),
            client.create_unit(&unit).await.unwrap_err(),
            client.destroy_unit("web-1").await.unwrap_err(),
        ];

        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        insta::assert_debug_snapshot!(messages, @r#"
        [
            "can't list machines: not connected to a live fleet endpoint",
            "can't get unit: not connected to a live fleet endpoint",
            "can't list units: not connected to a live fleet endpoint",
            "can't list unit states: not connected to a live fleet endpoint",
            "can't set unit desired state: not connected to a live fleet endpoint",
            "can't create unit: not connected to a live fleet endpoint",
            "can't destroy unit: not connected to a live fleet endpoint",
        ]
        "#);
        assert!(errors.iter().all(CoreError::is_not_connected));
    }
}
