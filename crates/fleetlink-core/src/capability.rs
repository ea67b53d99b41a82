use std::future::Future;

use crate::error::CoreError;
use crate::model::{JobState, Machine, Unit, UnitState};

/// Unit management against a fleet cluster.
///
/// Implemented by every client the resolver can hand out, live or not. The
/// reconciliation layer depends on nothing else.
pub trait UnitApi {
    fn list_machines(&self) -> impl Future<Output = Result<Vec<Machine>, CoreError>> + Send;

    /// `Ok(None)` when the unit does not exist.
    fn get_unit(&self, name: &str)
    -> impl Future<Output = Result<Option<Unit>, CoreError>> + Send;

    fn list_units(&self) -> impl Future<Output = Result<Vec<Unit>, CoreError>> + Send;

    fn list_unit_states(&self) -> impl Future<Output = Result<Vec<UnitState>, CoreError>> + Send;

    fn set_unit_desired_state(
        &self,
        name: &str,
        state: JobState,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn create_unit(&self, unit: &Unit) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn destroy_unit(&self, name: &str) -> impl Future<Output = Result<(), CoreError>> + Send;
}
