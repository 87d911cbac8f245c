//! Tracing layer that routes events through a [`MemoryTopology`].
//!
//! Conversion from a `tracing` event:
//! - `message` field becomes the message
//! - `marker` field becomes the marker
//! - other event fields, and fields of enclosing spans, become the context
//!   map (innermost value wins)
//! - enclosing span names become the context stack, outermost first
//! - target becomes the logger name, module path the originating scope

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::event::{Level, LogEvent};
use crate::topology::MemoryTopology;
use crate::LOG_TARGET;

/// Fields recorded on a span, kept in its extensions.
#[derive(Debug, Clone, Default)]
struct SpanFields(BTreeMap<String, String>);

/// Collects field values as strings.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    marker: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "marker" => self.marker = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }
}

/// Layer feeding every non-diagnostic event into a topology's root route.
///
/// Events on the `logredact` target are left to the status channel.
pub struct TopologyLayer {
    topology: Arc<MemoryTopology>,
}

impl TopologyLayer {
    pub fn new(topology: Arc<MemoryTopology>) -> Self {
        TopologyLayer { topology }
    }

    pub fn topology(&self) -> &Arc<MemoryTopology> {
        &self.topology
    }
}

impl<S> Layer<S> for TopologyLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.fields;
        if let Some(message) = visitor.message {
            fields.insert("message".to_string(), message);
        }

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
                fields.extend(visitor.fields);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == LOG_TARGET {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut log_event = LogEvent::new(
            meta.target(),
            Level::from(*meta.level()),
            visitor.message.unwrap_or_default(),
        );
        log_event.fqcn = meta.module_path().map(str::to_string);
        log_event.marker = visitor.marker;

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                log_event.context_stack.push(span.name().to_string());
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    for (key, value) in fields {
                        log_event.context.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        log_event.context.extend(visitor.fields);

        self.topology.log(&log_event);
    }
}
