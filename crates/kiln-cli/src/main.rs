//! `kiln` CLI binary entry point.
//!
//! Styled on `cuenv`'s own `main.rs`: set a panic hook, race the real work
//! against `SIGINT` with a biased `tokio::select!` so cancellation always
//! wins, then map the result to an exit code through one `render_error`
//! call. Build lifecycle events (`kiln-events`) are captured by a tracing
//! layer and rendered concurrently by a `CliRenderer` or `JsonRenderer`,
//! matching `cuenv`'s own renderer-behind-an-`EventBus` wiring.

// This binary's whole job is terminal output.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use kiln_cli::cli::{Cli, Commands};
use kiln_cli::engine::{self, Engine};
use kiln_cli::error::{CliError, EXIT_CANCELLED, EXIT_OK, exit_code_for, render_error};
use kiln_cli::output::OutputFormat;
use kiln_cli::{commands, loader};
use kiln_events::renderers::CliRendererConfig;
use kiln_events::{CliRenderer, EventBus, JsonRenderer, KilnEventLayer};
use std::io::IsTerminal;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("kiln panicked: {panic_info}");
    }));

    let cli = Cli::parse();
    let json_mode = cli.format == OutputFormat::Json;

    let bus = EventBus::new();
    init_tracing(&bus);
    let renderer = spawn_renderer(&bus, &cli);

    let exit_code = tokio::select! {
        biased;

        _ = tokio::signal::ctrl_c() => {
            kiln_events::emit_cancelled!("SIGINT");
            EXIT_CANCELLED
        }
        result = run(cli) => match result {
            Ok(()) => EXIT_OK,
            Err(err) => {
                render_error(&err, json_mode);
                exit_code_for(&err)
            }
        },
    };

    kiln_events::emit_shutdown!();
    bus.shutdown();
    renderer.await.ok();

    std::process::exit(exit_code);
}

/// Registers the `kiln::*` event-capturing layer alongside a plain
/// `EnvFilter`-gated fmt layer for everything else.
fn init_tracing(bus: &EventBus) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter);
    let Some(sender) = bus.sender() else {
        // Freshly constructed bus; only absent if shut down already.
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
        return;
    };
    let event_layer = KilnEventLayer::new(sender.into_inner());
    let _ = tracing_subscriber::registry().with(fmt_layer).with(event_layer).try_init();
}

/// Spawn the renderer task that drains `bus`'s events for the duration of
/// the run. `--format json` gets JSON lines; everything else gets the
/// interactive CLI renderer, colors disabled under `--plain` or a
/// non-terminal stdout.
fn spawn_renderer(bus: &EventBus, cli: &Cli) -> tokio::task::JoinHandle<()> {
    let receiver = bus.subscribe();
    if cli.format == OutputFormat::Json {
        tokio::spawn(JsonRenderer::new().run(receiver))
    } else {
        let config = CliRendererConfig {
            colors: !cli.plain && std::io::stderr().is_terminal(),
            verbose: false,
        };
        tokio::spawn(CliRenderer::with_config(config).run(receiver))
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let root = engine::workspace_root();
    let graph_path = cli.graph.clone().unwrap_or_else(|| root.clone());
    let specs = loader::load(&graph_path)?;

    let engine = Engine::new(&root).await?;
    let workers = if cli.workers > 0 { cli.workers } else { engine.config.workers };
    let format = if cli.plain { OutputFormat::Text } else { cli.format };
    kiln_events::emit_engine_started!(workers);

    match cli.command {
        Commands::Query { sub } => commands::query::dispatch(&sub, specs, &engine, &root, workers, format).await,
        Commands::Run { fqns } => commands::run::dispatch(&fqns, specs, &engine, &root, &cli.include, &cli.exclude, workers, format).await,
        Commands::Search { query, limit } => commands::search::dispatch(&query, limit, specs, &engine, workers, format).await,
    }
}
