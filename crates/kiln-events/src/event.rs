//! Event type definitions for structured kiln events.
//!
//! This module defines the core event types that flow through the kiln event system.
//! Events are categorized by domain (target execution, gen-pass scheduling, engine
//! lifecycle) and include rich metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured kiln event with full metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KilnEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Correlation ID for request tracing across operations.
    pub correlation_id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Source information for the event.
    pub source: EventSource,
    /// The event category and data.
    pub category: EventCategory,
}

impl KilnEvent {
    /// Create a new event with the given category.
    #[must_use]
    pub fn new(correlation_id: Uuid, source: EventSource, category: EventCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id,
            timestamp: Utc::now(),
            source,
            category,
        }
    }
}

/// Source information for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    /// The tracing target (e.g., "`kiln::target`", "`kiln::genpass`").
    pub target: String,
    /// Source file path, if available.
    pub file: Option<String>,
    /// Source line number, if available.
    pub line: Option<u32>,
}

impl EventSource {
    /// Create a new event source with just a target.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            file: None,
            line: None,
        }
    }

    /// Create a new event source with file and line information.
    #[must_use]
    pub fn with_location(target: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            target: target.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// Event categories organized by domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventCategory {
    /// Target execution lifecycle events.
    Target(TargetEvent),
    /// Gen-pass (codegen target) scheduling events.
    GenPass(GenPassEvent),
    /// Engine/system lifecycle events.
    System(SystemEvent),
}

/// Target execution lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TargetEvent {
    /// Target execution started.
    Started {
        /// Fully-qualified target name.
        fqn: String,
        /// Recipe command being executed.
        command: String,
        /// Whether this is a sandboxed execution.
        sandboxed: bool,
    },
    /// Cache hit - using cached outputs instead of executing.
    CacheHit {
        /// Fully-qualified target name.
        fqn: String,
        /// Input hash that matched.
        cache_key: String,
        /// Which cache tier served the hit (e.g. "local", "<cache-name>").
        tier: String,
    },
    /// Cache miss - will execute.
    CacheMiss {
        /// Fully-qualified target name.
        fqn: String,
    },
    /// Target produced output.
    Output {
        /// Fully-qualified target name.
        fqn: String,
        /// Output stream.
        stream: Stream,
        /// Output content.
        content: String,
    },
    /// Target execution completed.
    Completed {
        /// Fully-qualified target name.
        fqn: String,
        /// Whether the target succeeded.
        success: bool,
        /// Exit code, if available.
        exit_code: Option<i32>,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// Target was skipped (group target, or already satisfied by a concurrent build).
    Skipped {
        /// Fully-qualified target name.
        fqn: String,
        /// Reason for skipping.
        reason: String,
    },
}

/// Gen-pass scheduling events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum GenPassEvent {
    /// A gen pass started.
    Started {
        /// Pass number, starting at 1.
        pass: u32,
    },
    /// New targets were registered by a gen pass.
    TargetsDiscovered {
        /// Pass number.
        pass: u32,
        /// Number of newly-registered targets.
        count: usize,
    },
    /// A gen pass completed, either converging or feeding into another pass.
    Completed {
        /// Pass number.
        pass: u32,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
}

/// Engine/system lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    /// The engine started with a worker pool of the given size.
    EngineStarted {
        /// Number of worker slots.
        worker_count: usize,
    },
    /// A build was cancelled.
    Cancelled {
        /// Human-readable cancellation reason.
        reason: String,
    },
    /// Engine shutdown.
    Shutdown,
}

/// Output stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = KilnEvent::new(
            Uuid::new_v4(),
            EventSource::new("kiln::test"),
            EventCategory::System(SystemEvent::Shutdown),
        );

        assert!(!event.id.is_nil());
        assert_eq!(event.source.target, "kiln::test");
    }

    #[test]
    fn test_event_serialization() {
        let event = KilnEvent::new(
            Uuid::new_v4(),
            EventSource::new("kiln::target"),
            EventCategory::Target(TargetEvent::Started {
                fqn: "//pkg:build".to_string(),
                command: "cargo build".to_string(),
                sandboxed: true,
            }),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("kiln::target"));
        assert!(json.contains("//pkg:build"));

        let parsed: KilnEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
    }

    #[test]
    fn test_event_source_with_location() {
        let source = EventSource::with_location("kiln::target", "src/main.rs", 42);
        assert_eq!(source.target, "kiln::target");
        assert_eq!(source.file, Some("src/main.rs".to_string()));
        assert_eq!(source.line, Some(42));
    }

    #[test]
    fn test_event_source_new() {
        let source = EventSource::new("kiln::genpass");
        assert_eq!(source.target, "kiln::genpass");
        assert!(source.file.is_none());
        assert!(source.line.is_none());
    }

    #[test]
    fn test_target_event_cache_hit() {
        let event = TargetEvent::CacheHit {
            fqn: "//pkg:test".to_string(),
            cache_key: "abc123".to_string(),
            tier: "local".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("CacheHit"));
        assert!(json.contains("abc123"));
    }

    #[test]
    fn test_target_event_cache_miss() {
        let event = TargetEvent::CacheMiss {
            fqn: "//pkg:test".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("CacheMiss"));
    }

    #[test]
    fn test_target_event_output() {
        let event = TargetEvent::Output {
            fqn: "//pkg:build".to_string(),
            stream: Stream::Stdout,
            content: "compiling...".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Output"));
        assert!(json.contains("Stdout"));
    }

    #[test]
    fn test_target_event_completed() {
        let event = TargetEvent::Completed {
            fqn: "//pkg:build".to_string(),
            success: true,
            exit_code: Some(0),
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Completed"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_target_event_skipped() {
        let event = TargetEvent::Skipped {
            fqn: "//pkg:group".to_string(),
            reason: "group target".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Skipped"));
        assert!(json.contains("group target"));
    }

    #[test]
    fn test_genpass_event_started() {
        let event = GenPassEvent::Started { pass: 1 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Started"));
    }

    #[test]
    fn test_genpass_event_targets_discovered() {
        let event = GenPassEvent::TargetsDiscovered { pass: 2, count: 5 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("TargetsDiscovered"));
        assert!(json.contains('5'));
    }

    #[test]
    fn test_genpass_event_completed() {
        let event = GenPassEvent::Completed {
            pass: 1,
            duration_ms: 3000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Completed"));
    }

    #[test]
    fn test_system_event_engine_started() {
        let event = SystemEvent::EngineStarted { worker_count: 8 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("EngineStarted"));
        assert!(json.contains('8'));
    }

    #[test]
    fn test_system_event_cancelled() {
        let event = SystemEvent::Cancelled {
            reason: "ctrl-c".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Cancelled"));
    }

    #[test]
    fn test_system_event_shutdown() {
        let event = SystemEvent::Shutdown;
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Shutdown"));
    }

    #[test]
    fn test_stream_enum() {
        assert_eq!(Stream::Stdout, Stream::Stdout);
        assert_ne!(Stream::Stdout, Stream::Stderr);

        let stdout_json = serde_json::to_string(&Stream::Stdout).unwrap();
        let stderr_json = serde_json::to_string(&Stream::Stderr).unwrap();

        assert!(stdout_json.contains("Stdout"));
        assert!(stderr_json.contains("Stderr"));
    }

    #[test]
    fn test_event_category_all_variants() {
        let categories = vec![
            EventCategory::Target(TargetEvent::CacheMiss {
                fqn: "//pkg:test".to_string(),
            }),
            EventCategory::GenPass(GenPassEvent::Started { pass: 1 }),
            EventCategory::System(SystemEvent::Shutdown),
        ];

        for cat in categories {
            let json = serde_json::to_string(&cat).unwrap();
            let parsed: EventCategory = serde_json::from_str(&json).unwrap();
            let json2 = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, json2);
        }
    }

    #[test]
    fn test_kiln_event_clone() {
        let event = KilnEvent::new(
            Uuid::new_v4(),
            EventSource::new("kiln::test"),
            EventCategory::System(SystemEvent::Shutdown),
        );
        let cloned = event.clone();
        assert_eq!(event.id, cloned.id);
        assert_eq!(event.correlation_id, cloned.correlation_id);
    }

    #[test]
    fn test_kiln_event_debug() {
        let event = KilnEvent::new(
            Uuid::new_v4(),
            EventSource::new("kiln::test"),
            EventCategory::System(SystemEvent::Shutdown),
        );
        let debug_str = format!("{event:?}");
        assert!(debug_str.contains("KilnEvent"));
    }
}
