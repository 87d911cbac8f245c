//! Log redaction installer.
//!
//! This library puts redacting proxies in front of the sinks of an
//! already-configured logging topology:
//! - Event model and the abstract topology seam
//! - A mutex/snapshot reference topology and a `tracing` bridge
//! - The redacting proxy sink
//! - The one-shot, fail-open installer
//!
//! Hosts register their topology and call [`install_once`] during startup.

pub mod config;
pub mod error;
pub mod event;
pub mod install;
pub mod logging;
pub mod proxy;
pub mod sink;
pub mod topology;

/// Target of the installer's own diagnostics.
pub const LOG_TARGET: &str = "logredact";

pub use config::InstallConfig;
pub use error::{InstallError, SinkError, TopologyError};
pub use event::{Level, LogEvent, Message};
pub use install::{
    global_state, install_once, register_topology, InstallGuard, InstallOutcome, InstallState,
    Installer,
};
pub use proxy::{ErrorPolicy, RedactingSink, DEFAULT_PROXY_PREFIX};
pub use sink::{CaptureSink, WriterSink};
pub use topology::{
    ConfigTransaction, Filter, FilterDecision, LoggingTopology, MarkerFilter, MemoryTopology,
    RouteAttachment, Sink,
};
