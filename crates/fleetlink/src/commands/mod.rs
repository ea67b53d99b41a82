//! Command dispatch: bridges CLI args -> fleet client -> output formatting.

pub mod config_cmd;
pub mod machines;
pub mod states;
pub mod units;

use fleetlink_core::FleetClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cluster-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &FleetClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Machines => machines::handle(client, global).await,
        Command::Units(args) => units::handle(client, args, global).await,
        Command::States => states::handle(client, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Ok(()),
    }
}
