// fleet's etcd-backed registry: keys API client, registry layout, and the
// daemon version check.

mod client;
pub mod etcd;
pub mod version;

pub use client::{DEFAULT_KEY_PREFIX, RegistryClient};
pub use etcd::{EtcdKeys, Node, PrevExist};
pub use version::{DaemonVersion, LINKED_FLEET_VERSION, VersionMismatch};
