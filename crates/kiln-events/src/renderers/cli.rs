//! CLI renderer for kiln events.
//!
//! Renders events to stdout/stderr for terminal display.
//! This module is allowed to use println!/eprintln! as it's the output layer.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use crate::bus::EventReceiver;
use crate::event::{EventCategory, GenPassEvent, KilnEvent, Stream, SystemEvent, TargetEvent};
use std::io::{self, IsTerminal, Write};

/// CLI renderer configuration.
#[derive(Debug, Clone)]
pub struct CliRendererConfig {
    /// Whether to use ANSI colors.
    pub colors: bool,
    /// Whether to show verbose output.
    pub verbose: bool,
}

impl Default for CliRendererConfig {
    fn default() -> Self {
        Self {
            colors: io::stdout().is_terminal(),
            verbose: false,
        }
    }
}

/// CLI renderer that outputs events to stdout/stderr.
#[derive(Debug)]
pub struct CliRenderer {
    config: CliRendererConfig,
}

impl CliRenderer {
    /// Create a new CLI renderer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CliRendererConfig::default(),
        }
    }

    /// Create a new CLI renderer with the given configuration.
    #[must_use]
    pub fn with_config(config: CliRendererConfig) -> Self {
        Self { config }
    }

    /// Run the renderer, consuming events from the receiver.
    pub async fn run(self, mut receiver: EventReceiver) {
        while let Some(event) = receiver.recv().await {
            self.render(&event);
        }
    }

    /// Render a single event.
    pub fn render(&self, event: &KilnEvent) {
        match &event.category {
            EventCategory::Target(target_event) => self.render_target(target_event),
            EventCategory::GenPass(genpass_event) => self.render_genpass(genpass_event),
            EventCategory::System(system_event) => self.render_system(system_event),
        }
    }

    fn render_target(&self, event: &TargetEvent) {
        match event {
            TargetEvent::Started {
                fqn,
                command,
                sandboxed,
            } => {
                let sandbox_indicator = if *sandboxed { " (sandboxed)" } else { "" };
                eprintln!("> [{fqn}] {command}{sandbox_indicator}");
            }
            TargetEvent::CacheHit { fqn, tier, .. } => {
                eprintln!("> [{fqn}] (cached, {tier})");
            }
            TargetEvent::CacheMiss { fqn } => {
                if self.config.verbose {
                    eprintln!("> [{fqn}] cache miss, executing...");
                }
            }
            TargetEvent::Output { stream, content, .. } => match stream {
                Stream::Stdout => {
                    print!("{content}");
                    let _ = io::stdout().flush();
                }
                Stream::Stderr => {
                    eprint!("{content}");
                    let _ = io::stderr().flush();
                }
            },
            TargetEvent::Completed {
                fqn,
                success,
                duration_ms,
                ..
            } => {
                if self.config.verbose {
                    let status = if *success { "completed" } else { "failed" };
                    eprintln!("> [{fqn}] {status} in {duration_ms}ms");
                }
            }
            TargetEvent::Skipped { fqn, reason } => {
                if self.config.verbose {
                    eprintln!("> [{fqn}] skipped: {reason}");
                }
            }
        }
    }

    fn render_genpass(&self, event: &GenPassEvent) {
        match event {
            GenPassEvent::Started { pass } => {
                eprintln!("> gen pass {pass}");
            }
            GenPassEvent::TargetsDiscovered { pass, count } => {
                if self.config.verbose {
                    eprintln!("> gen pass {pass}: {count} new targets");
                }
            }
            GenPassEvent::Completed { pass, duration_ms } => {
                if self.config.verbose {
                    eprintln!("> gen pass {pass} completed in {duration_ms}ms");
                }
            }
        }
    }

    fn render_system(&self, event: &SystemEvent) {
        match event {
            SystemEvent::EngineStarted { worker_count } => {
                if self.config.verbose {
                    eprintln!("> engine started with {worker_count} workers");
                }
            }
            SystemEvent::Cancelled { reason } => {
                eprintln!("> build cancelled: {reason}");
            }
            SystemEvent::Shutdown => {
                if self.config.verbose {
                    eprintln!("System shutdown");
                }
            }
        }
    }
}

impl Default for CliRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, KilnEvent};
    use uuid::Uuid;

    fn create_test_event(category: EventCategory) -> KilnEvent {
        KilnEvent {
            id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source: EventSource::new("kiln::test"),
            category,
        }
    }

    #[test]
    fn test_cli_renderer_config_default() {
        let config = CliRendererConfig::default();
        assert!(!config.verbose);
    }

    #[test]
    fn test_cli_renderer_config_custom() {
        let config = CliRendererConfig {
            colors: true,
            verbose: true,
        };
        assert!(config.colors);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_renderer_new() {
        let renderer = CliRenderer::new();
        assert!(!renderer.config.verbose);
    }

    #[test]
    fn test_cli_renderer_with_config() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        assert!(!renderer.config.colors);
        assert!(renderer.config.verbose);
    }

    #[test]
    fn test_cli_renderer_default_impl() {
        let renderer = CliRenderer::default();
        assert!(!renderer.config.verbose);
    }

    #[test]
    fn test_render_target_started() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::Started {
            fqn: "//pkg:build".to_string(),
            command: "cargo build".to_string(),
            sandboxed: true,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_started_non_sandboxed() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::Started {
            fqn: "//pkg:build".to_string(),
            command: "cargo build".to_string(),
            sandboxed: false,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_cache_hit() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::CacheHit {
            fqn: "//pkg:build".to_string(),
            cache_key: "abc123".to_string(),
            tier: "local".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_cache_miss_non_verbose() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::CacheMiss {
            fqn: "//pkg:build".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_cache_miss_verbose() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::Target(TargetEvent::CacheMiss {
            fqn: "//pkg:build".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_output_stdout() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::Output {
            fqn: "//pkg:build".to_string(),
            stream: Stream::Stdout,
            content: "Hello, world!".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_output_stderr() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::Target(TargetEvent::Output {
            fqn: "//pkg:build".to_string(),
            stream: Stream::Stderr,
            content: "Warning: deprecated".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_completed_verbose() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::Target(TargetEvent::Completed {
            fqn: "//pkg:build".to_string(),
            success: true,
            exit_code: Some(0),
            duration_ms: 1500,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_completed_failed() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::Target(TargetEvent::Completed {
            fqn: "//pkg:build".to_string(),
            success: false,
            exit_code: Some(1),
            duration_ms: 500,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_target_skipped() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::Target(TargetEvent::Skipped {
            fqn: "//pkg:group".to_string(),
            reason: "group target".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_genpass_started() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::GenPass(GenPassEvent::Started { pass: 1 }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_genpass_targets_discovered() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::GenPass(GenPassEvent::TargetsDiscovered {
            pass: 1,
            count: 3,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_genpass_completed() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::GenPass(GenPassEvent::Completed {
            pass: 1,
            duration_ms: 200,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_system_engine_started() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::System(SystemEvent::EngineStarted {
            worker_count: 8,
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_system_cancelled() {
        let renderer = CliRenderer::new();
        let event = create_test_event(EventCategory::System(SystemEvent::Cancelled {
            reason: "ctrl-c".to_string(),
        }));
        renderer.render(&event);
    }

    #[test]
    fn test_render_system_shutdown_verbose() {
        let config = CliRendererConfig {
            colors: false,
            verbose: true,
        };
        let renderer = CliRenderer::with_config(config);
        let event = create_test_event(EventCategory::System(SystemEvent::Shutdown));
        renderer.render(&event);
    }
}
