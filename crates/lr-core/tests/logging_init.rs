//! Global logging setup end to end.
//!
//! `init_logging` sets the process-wide subscriber, which can happen only
//! once, so this binary holds a single test that walks the host startup
//! sequence in order.

use std::sync::Arc;

use lr_core::logging::{init_default_logging, init_logging, LogConfig, LogFormat, CONSOLE_SINK};
use lr_core::{global_state, install_once, register_topology, CaptureSink, InstallState, MemoryTopology};

fn redaction_disabled() -> bool {
    std::env::var("LR_ENABLED")
        .map(|v| v == "0" || v == "false")
        .unwrap_or(false)
}

#[test]
fn test_host_startup_sequence() {
    // Pin the filter so an ambient RUST_LOG cannot hide app events.
    std::env::set_var("LR_LOG", "info");
    let console = Arc::new(CaptureSink::new(CONSOLE_SINK));
    let topo = Arc::new(
        MemoryTopology::builder()
            .sink_attached(console.clone())
            .build()
            .unwrap(),
    );
    let config = LogConfig::default()
        .with_format(LogFormat::Jsonl)
        .with_timestamps(false);

    assert!(init_logging(&config, Arc::clone(&topo)));
    assert!(!init_logging(&config, Arc::clone(&topo)));

    tracing::info!(target: "app", "server starting on 10.0.0.1");
    assert_eq!(console.messages(), vec!["server starting on 10.0.0.1"]);

    assert!(register_topology(topo.clone()));
    install_once();
    assert_ne!(global_state(), InstallState::Uninstalled);

    // Installer diagnostics stay on the status channel.
    tracing::warn!(target: "logredact", "status line from 10.0.0.2");
    assert_eq!(console.len(), 1);

    tracing::info!(target: "app", "client 203.0.113.5 connected");
    let last = console.messages().pop().unwrap();
    if redaction_disabled() {
        assert_eq!(last, "client 203.0.113.5 connected");
    } else {
        assert_eq!(global_state(), InstallState::Installed);
        assert_eq!(last, "client [REDACTED_IP] connected");
    }
    assert_eq!(console.len(), 2);

    // Subscriber already set: the default setup still hands back a topology
    // with the console sink attached.
    let fallback = init_default_logging().unwrap();
    assert_eq!(fallback.attachments()[0].sink_name, CONSOLE_SINK);
}
