//! Structured event system for kiln.
//!
//! This crate provides a unified event system that enables multiple UI frontends
//! (CLI, JSON, future TUI) to subscribe to a single event stream. Events are emitted
//! using tracing macros and captured by a custom tracing Layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           kiln-events crate                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │ Event Schema │  │ EventBus     │  │ Tracing Layer│  │ Renderers   │ │
//! │  │ (typed)      │  │ (broadcast)  │  │ (capture)    │  │ (CLI/JSON)  │ │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └─────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use kiln_events::{EventBus, KilnEventLayer, emit_target_started};
//! use tracing_subscriber::layer::SubscriberExt;
//! use tracing_subscriber::util::SubscriberInitExt;
//!
//! // Create event bus and layer
//! let bus = EventBus::new();
//! let layer = KilnEventLayer::new(bus.sender().unwrap().into_inner());
//!
//! // Initialize tracing with the layer
//! tracing_subscriber::registry()
//!     .with(layer)
//!     .init();
//!
//! // Emit events using macros
//! emit_target_started!("//pkg:build", "cargo build", false);
//! ```

pub mod bus;
pub mod event;
pub mod layer;
pub mod metadata;
pub mod redaction;
pub mod renderers;

// Re-exports for convenience
pub use bus::{EventBus, EventReceiver, EventSender, SendError};
pub use event::{
    EventCategory, EventSource, GenPassEvent, KilnEvent, Stream, SystemEvent, TargetEvent,
};
pub use layer::KilnEventLayer;
pub use metadata::{MetadataContext, correlation_id, set_correlation_id};
pub use redaction::{REDACTED_PLACEHOLDER, redact, register_secret, register_secrets};
pub use renderers::{CliRenderer, JsonRenderer};

// ============================================================================
// Emit Macros
// ============================================================================

/// Emit a target started event.
///
/// # Example
/// ```rust,ignore
/// emit_target_started!("//pkg:build", "cargo build", true);
/// ```
#[macro_export]
macro_rules! emit_target_started {
    ($fqn:expr, $command:expr, $sandboxed:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.started",
            fqn = %$fqn,
            command = %$command,
            sandboxed = $sandboxed,
        )
    };
}

/// Emit a target cache hit event.
///
/// # Example
/// ```rust,ignore
/// emit_target_cache_hit!("//pkg:build", "abc123", "local");
/// ```
#[macro_export]
macro_rules! emit_target_cache_hit {
    ($fqn:expr, $cache_key:expr, $tier:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.cache_hit",
            fqn = %$fqn,
            cache_key = %$cache_key,
            tier = %$tier,
        )
    };
}

/// Emit a target cache miss event.
#[macro_export]
macro_rules! emit_target_cache_miss {
    ($fqn:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.cache_miss",
            fqn = %$fqn,
        )
    };
}

/// Emit a target output event.
///
/// # Example
/// ```rust,ignore
/// emit_target_output!("//pkg:build", "stdout", "Compiling...");
/// ```
#[macro_export]
macro_rules! emit_target_output {
    ($fqn:expr, $stream:expr, $content:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.output",
            fqn = %$fqn,
            stream = $stream,
            content = %$content,
        )
    };
}

/// Emit a target completed event.
///
/// # Example
/// ```rust,ignore
/// emit_target_completed!("//pkg:build", true, Some(0), 1234);
/// ```
#[macro_export]
macro_rules! emit_target_completed {
    ($fqn:expr, $success:expr, $exit_code:expr, $duration_ms:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.completed",
            fqn = %$fqn,
            success = $success,
            exit_code = ?$exit_code,
            duration_ms = $duration_ms,
        )
    };
}

/// Emit a target skipped event.
#[macro_export]
macro_rules! emit_target_skipped {
    ($fqn:expr, $reason:expr) => {
        ::tracing::info!(
            target: "kiln::target",
            event_type = "target.skipped",
            fqn = %$fqn,
            reason = %$reason,
        )
    };
}

// Gen-pass events

/// Emit a gen-pass started event.
#[macro_export]
macro_rules! emit_genpass_started {
    ($pass:expr) => {
        ::tracing::info!(
            target: "kiln::genpass",
            event_type = "genpass.started",
            pass = $pass,
        )
    };
}

/// Emit a gen-pass targets-discovered event.
#[macro_export]
macro_rules! emit_genpass_targets_discovered {
    ($pass:expr, $count:expr) => {
        ::tracing::info!(
            target: "kiln::genpass",
            event_type = "genpass.targets_discovered",
            pass = $pass,
            count = $count,
        )
    };
}

/// Emit a gen-pass completed event.
#[macro_export]
macro_rules! emit_genpass_completed {
    ($pass:expr, $duration_ms:expr) => {
        ::tracing::info!(
            target: "kiln::genpass",
            event_type = "genpass.completed",
            pass = $pass,
            duration_ms = $duration_ms,
        )
    };
}

// System events

/// Emit an engine started event.
#[macro_export]
macro_rules! emit_engine_started {
    ($worker_count:expr) => {
        ::tracing::info!(
            target: "kiln::system",
            event_type = "system.engine_started",
            worker_count = $worker_count,
        )
    };
}

/// Emit a build cancelled event.
#[macro_export]
macro_rules! emit_cancelled {
    ($reason:expr) => {
        ::tracing::info!(
            target: "kiln::system",
            event_type = "system.cancelled",
            reason = %$reason,
        )
    };
}

/// Emit a system shutdown event.
#[macro_export]
macro_rules! emit_shutdown {
    () => {
        ::tracing::info!(
            target: "kiln::system",
            event_type = "system.shutdown",
        )
    };
}

/// Print to stdout with automatic secret redaction (with newline).
///
/// Use this instead of `println!` when output might contain secrets.
/// This function applies `redact()` to the input before printing,
/// ensuring any registered secrets are replaced with `*_*`.
#[allow(clippy::print_stdout)]
pub fn println_redacted(content: &str) {
    println!("{}", redact(content));
}

/// Print to stdout with automatic secret redaction (no newline).
///
/// Use this instead of `print!` when output might contain secrets.
#[allow(clippy::print_stdout)]
pub fn print_redacted(content: &str) {
    print!("{}", redact(content));
}

#[cfg(test)]
#[allow(clippy::cognitive_complexity)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tracing_subscriber::layer::SubscriberExt;

    fn with_test_subscriber(f: impl FnOnce()) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let layer = KilnEventLayer::new(tx);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
    }

    #[tokio::test]
    async fn test_target_macros_compile() {
        with_test_subscriber(|| {
            emit_target_started!("//pkg:build", "cargo build", true);
            emit_target_cache_hit!("//pkg:build", "abc123", "local");
            emit_target_cache_miss!("//pkg:test");
            emit_target_output!("//pkg:build", "stdout", "output");
            emit_target_completed!("//pkg:build", true, Some(0), 1000_u64);
            emit_target_skipped!("//pkg:group", "group target");
        });
    }

    #[tokio::test]
    async fn test_genpass_macros_compile() {
        with_test_subscriber(|| {
            emit_genpass_started!(1_u64);
            emit_genpass_targets_discovered!(1_u64, 4_usize);
            emit_genpass_completed!(1_u64, 500_u64);
        });
    }

    #[tokio::test]
    async fn test_system_macros_compile() {
        with_test_subscriber(|| {
            emit_engine_started!(8_usize);
            emit_cancelled!("ctrl-c");
            emit_shutdown!();
        });
    }
}
