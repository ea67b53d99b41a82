// The client handed out by the resolver: one of the live backends or the
// placeholder. Selected once at resolution time, never changed afterwards.

use std::sync::Arc;

use fleetlink_api::{FleetHttpClient, RegistryClient, SshTunnel, VersionMismatch};
use tracing::debug;

use crate::capability::UnitApi;
use crate::error::CoreError;
use crate::model::{JobState, Machine, Unit, UnitState};
use crate::null::NullClient;

/// A resolved fleet client.
#[derive(Debug, Clone)]
pub enum FleetClient {
    /// fleet's HTTP API over TCP, a Unix socket, or an SSH tunnel.
    Http(FleetHttpClient),
    /// fleet's registry in etcd.
    Registry(RegistryClient),
    /// No live connection.
    Null(NullClient),
}

impl FleetClient {
    /// Short backend name for logs and output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Registry(_) => "registry",
            Self::Null(_) => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Version warning recorded while resolving a registry client.
    pub fn version_warning(&self) -> Option<&VersionMismatch> {
        match self {
            Self::Registry(client) => client.version_warning(),
            Self::Http(_) | Self::Null(_) => None,
        }
    }

    /// The SSH tunnel this client talks through, if any.
    pub fn tunnel(&self) -> Option<&Arc<SshTunnel>> {
        let transport = match self {
            Self::Http(client) => client.transport(),
            Self::Registry(client) => client.keys().transport(),
            Self::Null(_) => return None,
        };
        transport.dialer().and_then(|d| d.tunnel())
    }

    /// End the SSH session, if there is one. Dropping the last clone of
    /// the client has the same effect, without the polite disconnect.
    pub async fn close(&self) -> Result<(), CoreError> {
        if let Some(tunnel) = self.tunnel() {
            debug!(tunnel = tunnel.target(), "closing SSH tunnel");
            tunnel.close().await?;
        }
        Ok(())
    }
}

impl From<NullClient> for FleetClient {
    fn from(client: NullClient) -> Self {
        Self::Null(client)
    }
}

impl UnitApi for FleetClient {
    async fn list_machines(&self) -> Result<Vec<Machine>, CoreError> {
        match self {
            Self::Http(c) => Ok(c.list_machines().await?),
            Self::Registry(c) => Ok(c.list_machines().await?),
            Self::Null(c) => c.list_machines().await,
        }
    }

    async fn get_unit(&self, name: &str) -> Result<Option<Unit>, CoreError> {
        let unit = match self {
            Self::Http(c) => c.get_unit(name).await?,
            Self::Registry(c) => c.get_unit(name).await?,
            Self::Null(c) => return c.get_unit(name).await,
        };
        Ok(unit.map(Unit::from))
    }

    async fn list_units(&self) -> Result<Vec<Unit>, CoreError> {
        let units = match self {
            Self::Http(c) => c.list_units().await?,
            Self::Registry(c) => c.list_units().await?,
            Self::Null(c) => return c.list_units().await,
        };
        Ok(units.into_iter().map(Unit::from).collect())
    }

    async fn list_unit_states(&self) -> Result<Vec<UnitState>, CoreError> {
        match self {
            Self::Http(c) => Ok(c.list_unit_states().await?),
            Self::Registry(c) => Ok(c.list_unit_states().await?),
            Self::Null(c) => c.list_unit_states().await,
        }
    }

    async fn set_unit_desired_state(&self, name: &str, state: JobState) -> Result<(), CoreError> {
        match self {
            Self::Http(c) => Ok(c.set_unit_desired_state(name, state).await?),
            Self::Registry(c) => Ok(c.set_unit_desired_state(name, state).await?),
            Self::Null(c) => c.set_unit_desired_state(name, state).await,
        }
    }

    async fn create_unit(&self, unit: &Unit) -> Result<(), CoreError> {
        let wire = fleetlink_api::Unit::from(unit);
        match self {
            Self::Http(c) => Ok(c.create_unit(&wire).await?),
            Self::Registry(c) => Ok(c.create_unit(&wire).await?),
            Self::Null(c) => c.create_unit(unit).await,
        }
    }

    async fn destroy_unit(&self, name: &str) -> Result<(), CoreError> {
        match self {
            Self::Http(c) => Ok(c.destroy_unit(name).await?),
            Self::Registry(c) => Ok(c.destroy_unit(name).await?),
            Self::Null(c) => c.destroy_unit(name).await,
        }
    }
}
