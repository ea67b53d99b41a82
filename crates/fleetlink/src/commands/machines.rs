//! Machine command handler.

use fleetlink_core::{FleetClient, Machine, UnitApi};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct MachineRow {
    #[tabled(rename = "Machine")]
    id: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Metadata")]
    metadata: String,
}

impl From<&Machine> for MachineRow {
    fn from(m: &Machine) -> Self {
        Self {
            id: m.id.clone(),
            ip: m.primary_ip.clone(),
            metadata: m
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &FleetClient, global: &GlobalOpts) -> Result<(), CliError> {
    let machines = client.list_machines().await?;
    let out = output::render_list(global.output, &machines, |m| MachineRow::from(m), |m| {
        m.id.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
