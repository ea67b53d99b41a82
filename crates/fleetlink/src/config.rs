//! Settings loading with CLI flag overrides.

use std::path::PathBuf;

use fleetlink_config::{Settings, config_path, load_settings};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation reads.
pub fn active_config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// File and environment layers, then flags on top.
pub fn load(global: &GlobalOpts) -> Result<Settings, CliError> {
    let path = active_config_path(global);
    let mut settings = load_settings(Some(path.as_path()))?;
    apply_overrides(&mut settings, global);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, global: &GlobalOpts) {
    if let Some(driver) = &global.driver {
        settings.driver.clone_from(driver);
    }
    if let Some(endpoint) = &global.endpoint {
        settings.endpoint.clone_from(endpoint);
    }
    if let Some(prefix) = &global.registry_key_prefix {
        settings.registry_key_prefix.clone_from(prefix);
    }

    override_optional(&mut settings.ca_file, global.ca_file.as_ref());
    override_optional(&mut settings.cert_file, global.cert_file.as_ref());
    override_optional(&mut settings.key_file, global.key_file.as_ref());
    override_optional(&mut settings.tunnel, global.tunnel.as_ref());
    override_optional(
        &mut settings.ssh_identity_file,
        global.ssh_identity_file.as_ref(),
    );

    if let Some(user) = &global.ssh_username {
        settings.ssh_username.clone_from(user);
    }
    if let Some(file) = &global.known_hosts_file {
        settings.known_hosts_file.clone_from(file);
    }
    if let Some(strict) = global.strict_host_key_checking {
        settings.strict_host_key_checking = strict;
    }
    if let Some(secs) = global.ssh_timeout {
        settings.ssh_timeout = secs;
    }
    if let Some(secs) = global.request_timeout {
        settings.request_timeout = secs;
    }
    if let Some(retries) = global.max_connection_retries {
        settings.max_connection_retries = retries;
    }
}

fn override_optional(slot: &mut Option<String>, flag: Option<&String>) {
    if let Some(value) = flag {
        *slot = Some(value.clone());
    }
}
