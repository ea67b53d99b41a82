//! Unit state command handler.

use fleetlink_core::{FleetClient, UnitApi, UnitState};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Unit")]
    name: String,
    #[tabled(rename = "Machine")]
    machine: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Sub")]
    sub: String,
    #[tabled(rename = "Hash")]
    hash: String,
}

impl From<&UnitState> for StateRow {
    fn from(s: &UnitState) -> Self {
        Self {
            name: s.name.clone(),
            machine: s.machine_id.clone(),
            load: s.systemd_load_state.clone(),
            active: s.systemd_active_state.clone(),
            sub: s.systemd_sub_state.clone(),
            hash: s.hash.chars().take(7).collect(),
        }
    }
}

pub async fn handle(client: &FleetClient, global: &GlobalOpts) -> Result<(), CliError> {
    let states = client.list_unit_states().await?;
    let out = output::render_list(global.output, &states, |s| StateRow::from(s), |s| {
        format!("{}\t{}", s.name, s.machine_id)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
