//! Logging setup for hosts that use `tracing`.
//!
//! Two channels:
//! - application events go through a [`TopologyLayer`] into the root route,
//!   where redacting proxies can be installed
//! - installer diagnostics (`logredact` target) go to stderr as status
//!   lines, human or JSONL, and never through the root route
//!
//! # Usage
//!
//! ```ignore
//! use lr_core::logging::init_default_logging;
//!
//! let topology = init_default_logging()?;
//! lr_core::register_topology(topology);
//! lr_core::install_once();
//! tracing::info!(target: "app", "client 10.0.0.1 connected");
//! ```

pub mod config;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use layer::TopologyLayer;

use std::io::IsTerminal;
use std::sync::Arc;

use tracing::{Metadata, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::TopologyError;
use crate::sink::WriterSink;
use crate::topology::MemoryTopology;
use crate::LOG_TARGET;

/// Name of the stderr sink attached by [`init_default_logging`].
pub const CONSOLE_SINK: &str = "console";

fn is_status_event(meta: &Metadata<'_>) -> bool {
    meta.target() == LOG_TARGET
}

fn status_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(true);
            if config.timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        LogFormat::Jsonl => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// Respects `LR_LOG`, then `RUST_LOG`, for filtering; falls back to
/// `config.level`. Returns `false` if a global subscriber was already set.
pub fn init_logging(config: &LogConfig, topology: Arc<MemoryTopology>) -> bool {
    let filter = EnvFilter::try_from_env("LR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let status = status_layer(config).with_filter(filter_fn(is_status_event));

    tracing_subscriber::registry()
        .with(filter)
        .with(TopologyLayer::new(topology))
        .with(status)
        .try_init()
        .is_ok()
}

/// Environment-configured logging with one stderr sink on the root route.
///
/// Returns the topology so the host can register it for installation.
pub fn init_default_logging() -> Result<Arc<MemoryTopology>, TopologyError> {
    let config = LogConfig::from_env(None, None);
    let console = WriterSink::stderr(CONSOLE_SINK, config.format);
    let topology = Arc::new(
        MemoryTopology::builder()
            .sink_attached(Arc::new(console))
            .build()?,
    );
    init_logging(&config, Arc::clone(&topology));
    Ok(topology)
}
