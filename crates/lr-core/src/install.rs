//! One-shot installation of redacting proxies on the root route.
//!
//! # Overview
//!
//! Installation rewires an already-configured topology so that every sink on
//! the root route receives redacted events:
//!
//! 1. Claim the process-wide [`InstallGuard`] (one atomic compare-exchange).
//! 2. Open a configuration transaction and read the root attachments.
//! 3. For each attachment, register a started [`RedactingSink`], attach it
//!    with the same threshold and the same filter instance, then detach the
//!    original.
//! 4. Commit once.
//!
//! # Failure
//!
//! Installation never fails the host. A failure on sink *k* is rolled back
//! inside the transaction and stops the loop; swaps already completed are
//! committed and the rest of the route is left untouched. If the rollback
//! itself fails, nothing is committed. Panics from host sinks or from the
//! topology are caught. Either way one error is logged and the guard ends in
//! [`InstallState::FailedOpen`]. There is no retry within a process.
//!
//! Diagnostics are emitted after the transaction is released, on the
//! `logredact` target.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use lr_redact::Redactor;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::InstallConfig;
use crate::error::InstallError;
use crate::proxy::RedactingSink;
use crate::topology::{ConfigTransaction, LoggingTopology, RouteAttachment, Sink};
use crate::LOG_TARGET;

const UNINSTALLED: u8 = 0;
const INSTALLING: u8 = 1;
const INSTALLED: u8 = 2;
const FAILED_OPEN: u8 = 3;

/// Lifecycle of an [`InstallGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Uninstalled,
    Installing,
    Installed,
    FailedOpen,
}

impl InstallState {
    fn from_code(code: u8) -> Self {
        match code {
            UNINSTALLED => InstallState::Uninstalled,
            INSTALLING => InstallState::Installing,
            INSTALLED => InstallState::Installed,
            _ => InstallState::FailedOpen,
        }
    }

    fn code(self) -> u8 {
        match self {
            InstallState::Uninstalled => UNINSTALLED,
            InstallState::Installing => INSTALLING,
            InstallState::Installed => INSTALLED,
            InstallState::FailedOpen => FAILED_OPEN,
        }
    }
}

/// Atomic one-shot state cell. Once claimed it is never reset.
#[derive(Debug)]
pub struct InstallGuard {
    state: AtomicU8,
}

impl InstallGuard {
    pub const fn new() -> Self {
        InstallGuard {
            state: AtomicU8::new(UNINSTALLED),
        }
    }

    /// Claim the guard. Returns `false` if anyone claimed it before.
    pub fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(UNINSTALLED, INSTALLING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn state(&self) -> InstallState {
        InstallState::from_code(self.state.load(Ordering::Acquire))
    }

    fn finish(&self, state: InstallState) {
        self.state.store(state.code(), Ordering::Release);
    }
}

impl Default for InstallGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one installation attempt.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The guard was already claimed; the topology was not touched.
    AlreadyInstalled,
    /// Installation is switched off by configuration.
    Disabled,
    /// The root route has no sink that could be wrapped.
    NothingToWrap,
    Installed { wrapped: usize },
    /// Stopped early; `wrapped` sinks were swapped and committed.
    FailedOpen { wrapped: usize, error: InstallError },
}

impl InstallOutcome {
    /// Number of sinks now behind a proxy because of this attempt.
    pub fn wrapped(&self) -> usize {
        match self {
            InstallOutcome::Installed { wrapped } | InstallOutcome::FailedOpen { wrapped, .. } => {
                *wrapped
            }
            _ => 0,
        }
    }

    pub fn is_failed_open(&self) -> bool {
        matches!(self, InstallOutcome::FailedOpen { .. })
    }
}

/// What happened inside the transaction; logged once it is released.
#[derive(Default)]
struct WrapReport {
    nothing_to_wrap: bool,
    wrapped: usize,
    blank: usize,
    unresolved: Vec<String>,
    failure: Option<InstallError>,
}

/// Installs redacting proxies using a caller-supplied guard.
pub struct Installer<'g> {
    guard: &'g InstallGuard,
    config: InstallConfig,
    redactor: Arc<Redactor>,
}

impl<'g> Installer<'g> {
    /// Installer with the default configuration and rule set.
    pub fn new(guard: &'g InstallGuard) -> Self {
        Installer {
            guard,
            config: InstallConfig::default(),
            redactor: Arc::new(Redactor::new()),
        }
    }

    pub fn with_config(mut self, config: InstallConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Run installation against `topology`, at most once per guard.
    pub fn install(&self, topology: &dyn LoggingTopology) -> InstallOutcome {
        if !self.guard.try_begin() {
            debug!(target: LOG_TARGET, "redaction already installed; skipping");
            return InstallOutcome::AlreadyInstalled;
        }

        if !self.config.enabled {
            info!(target: LOG_TARGET, "log redaction disabled by configuration");
            self.guard.finish(InstallState::Installed);
            return InstallOutcome::Disabled;
        }

        let report = match panic::catch_unwind(AssertUnwindSafe(|| self.wrap_root_sinks(topology))) {
            Ok(report) => report,
            Err(payload) => WrapReport {
                failure: Some(InstallError::Panicked(panic_message(&*payload))),
                ..WrapReport::default()
            },
        };

        if report.blank > 0 {
            debug!(
                target: LOG_TARGET,
                count = report.blank,
                "skipped root attachments with blank sink names"
            );
        }
        for name in &report.unresolved {
            warn!(
                target: LOG_TARGET,
                sink = %name,
                "root attachment does not resolve to a sink; left unwrapped"
            );
        }

        if let Some(error) = report.failure {
            error!(
                target: LOG_TARGET,
                code = error.code(),
                wrapped = report.wrapped,
                "log redaction install failed, continuing unredacted: {}",
                error
            );
            self.guard.finish(InstallState::FailedOpen);
            return InstallOutcome::FailedOpen {
                wrapped: report.wrapped,
                error,
            };
        }

        if report.nothing_to_wrap {
            warn!(
                target: LOG_TARGET,
                "no root sinks to wrap; log redaction is inactive"
            );
            self.guard.finish(InstallState::Installed);
            return InstallOutcome::NothingToWrap;
        }

        info!(
            target: LOG_TARGET,
            wrapped = report.wrapped,
            "log redaction installed on {} sink(s)",
            report.wrapped
        );
        self.guard.finish(InstallState::Installed);
        InstallOutcome::Installed {
            wrapped: report.wrapped,
        }
    }

    /// Swap proxies in under one transaction. Holds the configuration lock
    /// for the whole pass and emits no diagnostics.
    fn wrap_root_sinks(&self, topology: &dyn LoggingTopology) -> WrapReport {
        let mut report = WrapReport::default();

        let mut txn = match topology.begin() {
            Ok(txn) => txn,
            Err(e) => {
                report.failure = Some(e.into());
                return report;
            }
        };

        let attachments = txn.root_attachments();
        let wrappable = attachments
            .iter()
            .filter(|att| !is_blank(&att.sink_name) && txn.sink(&att.sink_name).is_some())
            .count();
        if wrappable == 0 {
            report.nothing_to_wrap = true;
            return report;
        }

        for attachment in attachments {
            if is_blank(&attachment.sink_name) {
                report.blank += 1;
                continue;
            }
            let Some(original) = txn.sink(&attachment.sink_name) else {
                report.unresolved.push(attachment.sink_name);
                continue;
            };
            match self.swap(&mut *txn, &attachment, original) {
                Ok(()) => report.wrapped += 1,
                Err(SwapError::RolledBack(e)) => {
                    report.failure = Some(e);
                    break;
                }
                Err(SwapError::Dirty(e)) => {
                    // Dropping the transaction discards every pending change.
                    report.wrapped = 0;
                    report.failure = Some(e);
                    return report;
                }
            }
        }

        if let Err(e) = txn.commit() {
            report.wrapped = 0;
            report.failure = Some(e.into());
        }
        report
    }

    /// Put a proxy in front of one sink. The proxy is attached before the
    /// original is detached, so a failed step never leaves the sink off the
    /// route; on failure the pending changes for this sink are undone.
    fn swap(
        &self,
        txn: &mut dyn ConfigTransaction,
        attachment: &RouteAttachment,
        original: Arc<dyn Sink>,
    ) -> Result<(), SwapError> {
        let proxy = RedactingSink::new(&self.config.proxy_prefix, original, Arc::clone(&self.redactor))
            .with_error_policy(self.config.error_policy);
        proxy
            .start()
            .map_err(|e| SwapError::RolledBack(e.into()))?;
        let proxy_name = proxy.name().to_string();
        txn.add_sink(Arc::new(proxy))
            .map_err(|e| SwapError::RolledBack(e.into()))?;

        if let Err(e) = txn.attach(attachment.retarget(proxy_name.as_str())) {
            let undone = txn.remove_sink(&proxy_name).is_ok();
            return Err(SwapError::new(undone, e.into()));
        }
        if let Err(e) = txn.detach(&attachment.sink_name) {
            let undone =
                txn.detach(&proxy_name).is_ok() && txn.remove_sink(&proxy_name).is_ok();
            return Err(SwapError::new(undone, e.into()));
        }
        Ok(())
    }
}

/// Failed swap of one sink.
enum SwapError {
    /// The transaction is back to its state before the swap.
    RolledBack(InstallError),
    /// Undo failed; the transaction must not be committed.
    Dirty(InstallError),
}

impl SwapError {
    fn new(undone: bool, error: InstallError) -> Self {
        if undone {
            SwapError::RolledBack(error)
        } else {
            SwapError::Dirty(error)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

static GLOBAL_GUARD: InstallGuard = InstallGuard::new();
static GLOBAL_TOPOLOGY: OnceCell<Arc<dyn LoggingTopology>> = OnceCell::new();

/// Register the process's logging topology for [`install_once`].
///
/// Only the first registration wins; returns `false` for later calls.
pub fn register_topology(topology: Arc<dyn LoggingTopology>) -> bool {
    GLOBAL_TOPOLOGY.set(topology).is_ok()
}

/// State of the process-wide guard.
pub fn global_state() -> InstallState {
    GLOBAL_GUARD.state()
}

/// Install redaction on the registered topology, once per process.
///
/// Safe to call from any thread, any number of times. Configuration comes
/// from the environment (see [`InstallConfig::from_env`]).
pub fn install_once() {
    let Some(topology) = GLOBAL_TOPOLOGY.get() else {
        warn!(
            target: LOG_TARGET,
            "no logging topology registered; log redaction not installed"
        );
        return;
    };
    Installer::new(&GLOBAL_GUARD)
        .with_config(InstallConfig::from_env())
        .install(topology.as_ref());
}
