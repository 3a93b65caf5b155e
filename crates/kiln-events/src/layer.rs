//! Custom tracing Layer for capturing kiln events.
//!
//! This layer intercepts tracing events with specific targets and fields,
//! converts them to `KilnEvent` instances, and sends them to the `EventBus`.

// These casts are intentional for tracing field extraction - values come from trusted sources
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]

use crate::event::{
    EventCategory, EventSource, GenPassEvent, KilnEvent, Stream, SystemEvent, TargetEvent,
};
use crate::metadata::correlation_id;
use tokio::sync::mpsc;
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// A tracing Layer that captures kiln-specific events.
///
/// Events are identified by their `target` (must start with "kiln")
/// and an `event_type` field that specifies the event category.
pub struct KilnEventLayer {
    sender: mpsc::UnboundedSender<KilnEvent>,
}

impl KilnEventLayer {
    /// Create a new layer that sends events to the given channel.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<KilnEvent>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for KilnEventLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let target = meta.target();

        if !target.starts_with("kiln") {
            return;
        }

        let mut visitor = KilnEventVisitor::new(target);
        event.record(&mut visitor);

        if let Some(kiln_event) = visitor.build() {
            let _ = self.sender.send(kiln_event);
        }
    }
}

/// Visitor for extracting typed fields from tracing events.
struct KilnEventVisitor {
    target: String,
    event_type: Option<String>,

    // Target event fields
    fqn: Option<String>,
    command: Option<String>,
    sandboxed: Option<bool>,
    cache_key: Option<String>,
    tier: Option<String>,
    stream: Option<Stream>,
    content: Option<String>,
    success: Option<bool>,
    exit_code: Option<i32>,
    duration_ms: Option<u64>,
    reason: Option<String>,

    // Gen-pass event fields
    pass: Option<u32>,
    count: Option<usize>,

    // System event fields
    worker_count: Option<usize>,
}

impl KilnEventVisitor {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            event_type: None,
            fqn: None,
            command: None,
            sandboxed: None,
            cache_key: None,
            tier: None,
            stream: None,
            content: None,
            success: None,
            exit_code: None,
            duration_ms: None,
            reason: None,
            pass: None,
            count: None,
            worker_count: None,
        }
    }

    fn build(self) -> Option<KilnEvent> {
        let event_type = self.event_type.as_deref()?;
        let source = EventSource::new(&self.target);
        let correlation = correlation_id();

        let category = match event_type {
            "target.started" => EventCategory::Target(TargetEvent::Started {
                fqn: self.fqn?,
                command: self.command?,
                sandboxed: self.sandboxed.unwrap_or(false),
            }),
            "target.cache_hit" => EventCategory::Target(TargetEvent::CacheHit {
                fqn: self.fqn?,
                cache_key: self.cache_key?,
                tier: self.tier.unwrap_or_else(|| "local".to_string()),
            }),
            "target.cache_miss" => EventCategory::Target(TargetEvent::CacheMiss { fqn: self.fqn? }),
            "target.output" => EventCategory::Target(TargetEvent::Output {
                fqn: self.fqn?,
                stream: self.stream.unwrap_or(Stream::Stdout),
                content: self.content?,
            }),
            "target.completed" => EventCategory::Target(TargetEvent::Completed {
                fqn: self.fqn?,
                success: self.success?,
                exit_code: self.exit_code,
                duration_ms: self.duration_ms.unwrap_or(0),
            }),
            "target.skipped" => EventCategory::Target(TargetEvent::Skipped {
                fqn: self.fqn?,
                reason: self.reason?,
            }),

            "genpass.started" => EventCategory::GenPass(GenPassEvent::Started {
                pass: self.pass.unwrap_or(0),
            }),
            "genpass.targets_discovered" => EventCategory::GenPass(GenPassEvent::TargetsDiscovered {
                pass: self.pass.unwrap_or(0),
                count: self.count.unwrap_or(0),
            }),
            "genpass.completed" => EventCategory::GenPass(GenPassEvent::Completed {
                pass: self.pass.unwrap_or(0),
                duration_ms: self.duration_ms.unwrap_or(0),
            }),

            "system.engine_started" => EventCategory::System(SystemEvent::EngineStarted {
                worker_count: self.worker_count.unwrap_or(0),
            }),
            "system.cancelled" => EventCategory::System(SystemEvent::Cancelled {
                reason: self.reason?,
            }),
            "system.shutdown" => EventCategory::System(SystemEvent::Shutdown),

            _ => return None,
        };

        Some(KilnEvent::new(correlation, source, category))
    }
}

impl Visit for KilnEventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event_type" => self.event_type = Some(value.to_string()),
            "fqn" => self.fqn = Some(value.to_string()),
            "command" => self.command = Some(value.to_string()),
            "cache_key" => self.cache_key = Some(value.to_string()),
            "tier" => self.tier = Some(value.to_string()),
            "content" => self.content = Some(value.to_string()),
            "reason" => self.reason = Some(value.to_string()),
            "stream" => {
                self.stream = match value {
                    "stdout" => Some(Stream::Stdout),
                    "stderr" => Some(Stream::Stderr),
                    _ => None,
                };
            }
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "exit_code" => self.exit_code = Some(value as i32),
            "duration_ms" => self.duration_ms = Some(value as u64),
            "count" => self.count = Some(value as usize),
            "pass" => self.pass = Some(value as u32),
            "worker_count" => self.worker_count = Some(value as usize),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "duration_ms" => self.duration_ms = Some(value),
            "count" => self.count = Some(value as usize),
            "pass" => self.pass = Some(value as u32),
            "worker_count" => self.worker_count = Some(value as usize),
            _ => {}
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "sandboxed" => self.sandboxed = Some(value),
            "success" => self.success = Some(value),
            _ => {}
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}
