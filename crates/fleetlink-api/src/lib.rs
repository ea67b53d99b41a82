// fleetlink-api: transports and wire clients for the fleet cluster scheduler
// (fleet v1 HTTP API, etcd registry, SSH tunnels)

pub mod error;
pub mod http;
pub mod models;
pub mod registry;
pub mod retry;
pub mod ssh;
pub mod tls;
pub mod transport;
pub mod unit_file;

pub use error::Error;
pub use http::FleetHttpClient;
pub use models::{JobState, Machine, Unit, UnitOption, UnitState};
pub use registry::{EtcdKeys, RegistryClient, VersionMismatch};
pub use retry::{Retryable, retry};
pub use ssh::{HostKeyChecker, SshError, SshOptions, SshTunnel};
pub use tls::TlsConfig;
pub use transport::{Dialer, HttpTransport, TransportConfig};
