//! In-process logging topology.
//!
//! `MemoryTopology` keeps two copies of its configuration:
//! - the editable state behind a mutex (the configuration lock), and
//! - the committed root route, an immutable snapshot swapped on commit.
//!
//! Routing only reads the snapshot and never holds a lock while a sink runs,
//! so sinks may log back into the topology.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::{ConfigTransaction, LoggingTopology, RouteAttachment, Sink};
use crate::error::TopologyError;
use crate::event::LogEvent;

#[derive(Clone, Default)]
struct TopologyState {
    sinks: BTreeMap<String, Arc<dyn Sink>>,
    root: Vec<RouteAttachment>,
}

#[derive(Default)]
struct RouteSnapshot {
    entries: Vec<(RouteAttachment, Arc<dyn Sink>)>,
}

impl RouteSnapshot {
    fn from_state(state: &TopologyState) -> Self {
        let entries = state
            .root
            .iter()
            .filter_map(|att| {
                state
                    .sinks
                    .get(&att.sink_name)
                    .map(|sink| (att.clone(), Arc::clone(sink)))
            })
            .collect();
        RouteSnapshot { entries }
    }
}

/// Root-route-only logging topology.
#[derive(Default)]
pub struct MemoryTopology {
    config: Mutex<TopologyState>,
    active: RwLock<Arc<RouteSnapshot>>,
    commits: AtomicU64,
    delivery_failures: AtomicU64,
}

impl MemoryTopology {
    /// An empty topology: no sinks, nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    /// Route `event` through the committed root route.
    ///
    /// Returns the number of sinks that accepted it. Sink failures are
    /// counted, never returned.
    pub fn log(&self, event: &LogEvent) -> usize {
        let snapshot = self.snapshot();
        let mut delivered = 0;
        for (attachment, sink) in &snapshot.entries {
            if !attachment.admits(event) {
                continue;
            }
            match sink.append(event) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    self.delivery_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        delivered
    }

    /// Committed root attachments, in routing order.
    pub fn attachments(&self) -> Vec<RouteAttachment> {
        self.snapshot()
            .entries
            .iter()
            .map(|(att, _)| att.clone())
            .collect()
    }

    /// Committed attachment for `sink_name`, if any.
    pub fn attachment(&self, sink_name: &str) -> Option<RouteAttachment> {
        self.attachments()
            .into_iter()
            .find(|att| att.sink_name == sink_name)
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Number of `append` calls that returned an error.
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Arc<RouteSnapshot> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl LoggingTopology for MemoryTopology {
    fn begin(&self) -> Result<Box<dyn ConfigTransaction + '_>, TopologyError> {
        // Only `commit` writes through the guard, in one assignment, so state
        // left behind by a panicking holder is still a committed state.
        let guard = match self.config.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pending = guard.clone();
        Ok(Box::new(MemoryTransaction {
            topology: self,
            guard,
            pending,
        }))
    }
}

struct MemoryTransaction<'a> {
    topology: &'a MemoryTopology,
    guard: MutexGuard<'a, TopologyState>,
    pending: TopologyState,
}

impl ConfigTransaction for MemoryTransaction<'_> {
    fn root_attachments(&self) -> Vec<RouteAttachment> {
        self.pending.root.clone()
    }

    fn sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.pending.sinks.get(name).cloned()
    }

    fn add_sink(&mut self, sink: Arc<dyn Sink>) -> Result<(), TopologyError> {
        let name = sink.name().to_string();
        if self.pending.sinks.contains_key(&name) {
            return Err(TopologyError::DuplicateSink(name));
        }
        self.pending.sinks.insert(name, sink);
        Ok(())
    }

    fn remove_sink(&mut self, name: &str) -> Result<Arc<dyn Sink>, TopologyError> {
        if self.pending.root.iter().any(|att| att.sink_name == name) {
            return Err(TopologyError::SinkInUse(name.to_string()));
        }
        self.pending
            .sinks
            .remove(name)
            .ok_or_else(|| TopologyError::SinkNotFound(name.to_string()))
    }

    fn detach(&mut self, sink_name: &str) -> Result<RouteAttachment, TopologyError> {
        let idx = self
            .pending
            .root
            .iter()
            .position(|att| att.sink_name == sink_name)
            .ok_or_else(|| TopologyError::AttachmentNotFound(sink_name.to_string()))?;
        Ok(self.pending.root.remove(idx))
    }

    fn attach(&mut self, attachment: RouteAttachment) -> Result<(), TopologyError> {
        if !self.pending.sinks.contains_key(&attachment.sink_name) {
            return Err(TopologyError::SinkNotFound(attachment.sink_name));
        }
        if self
            .pending
            .root
            .iter()
            .any(|att| att.sink_name == attachment.sink_name)
        {
            return Err(TopologyError::DuplicateAttachment(attachment.sink_name));
        }
        self.pending.root.push(attachment);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), TopologyError> {
        let topology = self.topology;
        let snapshot = Arc::new(RouteSnapshot::from_state(&self.pending));
        let mut active = topology
            .active
            .write()
            .map_err(|_| TopologyError::LockPoisoned)?;
        *self.guard = std::mem::take(&mut self.pending);
        *active = snapshot;
        drop(active);
        topology.commits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Declarative construction of a [`MemoryTopology`].
#[derive(Default)]
pub struct TopologyBuilder {
    sinks: Vec<Arc<dyn Sink>>,
    attachments: Vec<RouteAttachment>,
}

impl TopologyBuilder {
    /// Register a sink.
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Attach a registered sink to the root route.
    pub fn attach(mut self, attachment: RouteAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Register `sink` and attach it with no threshold or filter.
    pub fn sink_attached(self, sink: Arc<dyn Sink>) -> Self {
        let attachment = RouteAttachment::new(sink.name());
        self.sink(sink).attach(attachment)
    }

    /// Validate and commit the initial configuration.
    pub fn build(self) -> Result<MemoryTopology, TopologyError> {
        let topology = MemoryTopology::new();
        {
            let mut txn = topology.begin()?;
            for sink in self.sinks {
                txn.add_sink(sink)?;
            }
            for attachment in self.attachments {
                txn.attach(attachment)?;
            }
            txn.commit()?;
        }
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::event::Level;
    use std::sync::atomic::AtomicUsize;

    struct CountingSink {
        name: String,
        seen: AtomicUsize,
        fail: bool,
    }

    impl CountingSink {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    impl Sink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn append(&self, _event: &LogEvent) -> Result<(), SinkError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SinkError::Rejected("test".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_routes_to_attached_sinks() {
        let a = CountingSink::new("a");
        let b = CountingSink::new("b");
        let topo = MemoryTopology::builder()
            .sink_attached(a.clone())
            .sink(b.clone())
            .build()
            .unwrap();

        assert_eq!(topo.log(&LogEvent::new("t", Level::Info, "m")), 1);
        assert_eq!(a.seen.load(Ordering::SeqCst), 1);
        assert_eq!(b.seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_threshold_applies_per_attachment() {
        let a = CountingSink::new("a");
        let topo = MemoryTopology::builder()
            .sink(a.clone())
            .attach(RouteAttachment::new("a").with_threshold(Level::Error))
            .build()
            .unwrap();

        topo.log(&LogEvent::new("t", Level::Warn, "m"));
        topo.log(&LogEvent::new("t", Level::Error, "m"));
        assert_eq!(a.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uncommitted_changes_are_discarded() {
        let a = CountingSink::new("a");
        let topo = MemoryTopology::builder().sink_attached(a).build().unwrap();
        {
            let mut txn = topo.begin().unwrap();
            txn.detach("a").unwrap();
        }
        assert_eq!(topo.attachments().len(), 1);
        assert_eq!(topo.commits(), 1);
    }

    #[test]
    fn test_commit_publishes_changes() {
        let a = CountingSink::new("a");
        let b = CountingSink::new("b");
        let topo = MemoryTopology::builder().sink_attached(a.clone()).build().unwrap();

        let mut txn = topo.begin().unwrap();
        txn.add_sink(b.clone()).unwrap();
        let old = txn.detach("a").unwrap();
        txn.attach(old.retarget("b")).unwrap();
        txn.commit().unwrap();

        topo.log(&LogEvent::new("t", Level::Info, "m"));
        assert_eq!(a.seen.load(Ordering::SeqCst), 0);
        assert_eq!(b.seen.load(Ordering::SeqCst), 1);
        assert_eq!(topo.commits(), 2);
    }

    #[test]
    fn test_attach_rejects_duplicates_and_unknown_sinks() {
        let a = CountingSink::new("a");
        let topo = MemoryTopology::builder().sink_attached(a.clone()).build().unwrap();
        let mut txn = topo.begin().unwrap();

        let err = txn.attach(RouteAttachment::new("a")).unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateAttachment(_)));

        let err = txn.attach(RouteAttachment::new("ghost")).unwrap_err();
        assert!(matches!(err, TopologyError::SinkNotFound(_)));

        let err = txn.add_sink(a).unwrap_err();
        assert_eq!(err.code(), 31);

        let err = txn.detach("ghost").unwrap_err();
        assert!(matches!(err, TopologyError::AttachmentNotFound(_)));
    }

    #[test]
    fn test_remove_sink_requires_detached() {
        let a = CountingSink::new("a");
        let b = CountingSink::new("b");
        let topo = MemoryTopology::builder()
            .sink_attached(a)
            .sink(b)
            .build()
            .unwrap();
        let mut txn = topo.begin().unwrap();

        let err = txn.remove_sink("a").err().unwrap();
        assert!(matches!(err, TopologyError::SinkInUse(_)));
        assert_eq!(txn.remove_sink("b").unwrap().name(), "b");
        assert!(txn.sink("b").is_none());
        assert!(matches!(
            txn.remove_sink("b").err().unwrap(),
            TopologyError::SinkNotFound(_)
        ));
    }

    #[test]
    fn test_begin_recovers_after_panicking_holder() {
        let a = CountingSink::new("a");
        let topo = MemoryTopology::builder().sink_attached(a.clone()).build().unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut txn = topo.begin().unwrap();
            txn.detach("a").unwrap();
            panic!("holder died");
        }));
        assert!(result.is_err());

        let txn = topo.begin().unwrap();
        assert_eq!(txn.root_attachments().len(), 1);
        drop(txn);
        assert_eq!(topo.log(&LogEvent::new("t", Level::Info, "m")), 1);
    }

    #[test]
    fn test_delivery_failures_are_counted() {
        let bad = CountingSink::failing("bad");
        let good = CountingSink::new("good");
        let topo = MemoryTopology::builder()
            .sink_attached(bad)
            .sink_attached(good.clone())
            .build()
            .unwrap();

        assert_eq!(topo.log(&LogEvent::new("t", Level::Info, "m")), 1);
        assert_eq!(topo.delivery_failures(), 1);
        assert_eq!(good.seen.load(Ordering::SeqCst), 1);
    }
}
