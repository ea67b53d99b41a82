//! Connectivity and unit management for the fleet cluster scheduler.
//!
//! - **[`resolve`]** turns a [`ConnectionConfig`] into a [`FleetClient`]:
//!   fleet's HTTP API (over TCP, a Unix socket or an SSH tunnel), fleet's
//!   etcd registry, or a [`NullClient`] when there is nothing to connect to.
//!
//! - **[`UnitApi`]** is the operation set every client supports. The
//!   [`resource`] module builds create/read/update/delete on top of it.
//!
//! - **Domain model** ([`model`]): units as named sections of ordered
//!   options. [`convert`] maps them to and from the flat wire form.

pub mod capability;
pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod null;
pub mod resolver;
pub mod resource;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capability::UnitApi;
pub use client::FleetClient;
pub use config::{ConnectionConfig, Driver, TlsFiles};
pub use error::CoreError;
pub use null::NullClient;
pub use resolver::{Endpoint, resolve};

pub use model::{JobState, Machine, Unit, UnitOption, UnitSection, UnitState};
