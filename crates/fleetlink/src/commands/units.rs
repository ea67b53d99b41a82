//! Unit command handlers.

use std::path::Path;

use fleetlink_core::convert::{parse_unit_file, render_unit_file};
use fleetlink_core::resource::{self, UnitSpec, UnitStatus};
use fleetlink_core::{FleetClient, Unit, UnitApi};
use tabled::Tabled;

use crate::cli::{GlobalOpts, UnitsArgs, UnitsCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "Unit")]
    name: String,
    #[tabled(rename = "Desired")]
    desired: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Machine")]
    machine: String,
}

impl UnitRow {
    fn new(unit: &Unit, color: bool) -> Self {
        Self {
            name: unit.name.clone(),
            desired: output::paint_state(unit.desired_state, color),
            current: unit
                .current_state
                .map(|s| output::paint_state(s, color))
                .unwrap_or_else(|| "-".into()),
            machine: unit.machine_id.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

fn status_detail(status: &UnitStatus, color: bool) -> String {
    output::detail_lines(&[
        ("Unit", status.name.clone()),
        ("Desired", output::paint_state(status.desired_state, color)),
        ("Current", output::paint_state(status.state, color)),
        (
            "Machine",
            status.machine_id.clone().unwrap_or_else(|| "-".into()),
        ),
    ])
}

fn read_unit_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &FleetClient,
    args: UnitsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        UnitsCommand::List => {
            let units = client.list_units().await?;
            let out = output::render_list(
                global.output,
                &units,
                |u| UnitRow::new(u, color),
                |u| u.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        UnitsCommand::Get { name } => {
            let Some(status) = resource::read(client, &name).await? else {
                return Err(CliError::UnitNotFound { name });
            };
            print_status(&status, global, color)
        }

        UnitsCommand::Cat { name } => {
            let Some(unit) = client.get_unit(&name).await? else {
                return Err(CliError::UnitNotFound { name });
            };
            let out = output::render_single(
                global.output,
                &unit,
                |u| render_unit_file(&u.sections),
                |u| render_unit_file(&u.sections),
            )?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        UnitsCommand::Create { name, state, file } => {
            let sections = parse_unit_file(&read_unit_file(&file)?)?;
            if sections.is_empty() {
                return Err(CliError::Validation {
                    field: "unit file".into(),
                    reason: format!("{} has no options", file.display()),
                });
            }
            let spec = UnitSpec {
                name,
                state,
                sections,
            };
            let status = resource::create(client, &spec).await?;
            print_status(&status, global, color)
        }

        UnitsCommand::SetState { name, state } => {
            let Some(status) = resource::update(client, &name, state).await? else {
                return Err(CliError::UnitNotFound { name });
            };
            print_status(&status, global, color)
        }

        UnitsCommand::Destroy { name } => {
            resource::delete(client, &name).await?;
            if !global.quiet {
                eprintln!("Destroyed {name}");
            }
            Ok(())
        }
    }
}

fn print_status(status: &UnitStatus, global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let out = output::render_single(
        global.output,
        status,
        |s| status_detail(s, color),
        |s| s.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
