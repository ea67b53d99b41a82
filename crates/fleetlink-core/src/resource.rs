// ── Unit resource lifecycle ──
//
// Create/read/update/delete of a declared unit, in terms of the capability
// trait. The resource id is the unit name. Only the desired state can
// change in place; any other change means destroy and recreate.

use serde::Serialize;
use tracing::debug;

use crate::capability::UnitApi;
use crate::error::CoreError;
use crate::model::{JobState, Unit, UnitSection};

/// A unit as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub name: String,
    pub state: JobState,
    pub sections: Vec<UnitSection>,
}

impl UnitSpec {
    fn to_unit(&self) -> Unit {
        Unit {
            name: self.name.clone(),
            desired_state: self.state,
            sections: self.sections.clone(),
            current_state: None,
            machine_id: None,
        }
    }
}

/// What the cluster reports back for a unit resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatus {
    pub id: String,
    pub name: String,
    pub desired_state: JobState,
    /// Observed state, falling back to the desired state when the backend
    /// does not report one.
    pub state: JobState,
    pub machine_id: Option<String>,
}

impl From<Unit> for UnitStatus {
    fn from(unit: Unit) -> Self {
        Self {
            id: unit.name.clone(),
            state: unit.current_state.unwrap_or(unit.desired_state),
            desired_state: unit.desired_state,
            name: unit.name,
            machine_id: unit.machine_id,
        }
    }
}

/// Create the unit, then read it back.
pub async fn create<C: UnitApi + Sync>(client: &C, spec: &UnitSpec) -> Result<UnitStatus, CoreError> {
    client.create_unit(&spec.to_unit()).await?;
    read(client, &spec.name)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            message: format!("unit {} vanished right after creation", spec.name),
        })
}

/// Current status; `None` when the unit no longer exists.
pub async fn read<C: UnitApi + Sync>(client: &C, id: &str) -> Result<Option<UnitStatus>, CoreError> {
    debug!(unit = id, "reading fleet unit");
    match client.get_unit(id).await? {
        Some(unit) => Ok(Some(unit.into())),
        None => {
            debug!(unit = id, "unit is gone");
            Ok(None)
        }
    }
}

/// Change the desired state, then read the unit back.
pub async fn update<C: UnitApi + Sync>(
    client: &C,
    id: &str,
    state: JobState,
) -> Result<Option<UnitStatus>, CoreError> {
    client.set_unit_desired_state(id, state).await?;
    read(client, id).await
}

pub async fn delete<C: UnitApi + Sync>(client: &C, id: &str) -> Result<(), CoreError> {
    client.destroy_unit(id).await
}
