//! `run` dispatch: resolve selectors, link the graph, run the transitive
//! build order for every selected target.

use crate::engine::Engine;
use crate::error::{CliError, OkEnvelope, Result};
use crate::output::OutputFormat;
use crate::selector;
use kiln_dag::Dag;
use kiln_spec::TargetSpec;
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::Path;

/// Run every target named by `fqns` (or read newline-delimited from stdin
/// if empty and stdin isn't a tty) plus their transitive dependencies.
///
/// # Errors
/// Returns an error if linking fails, a selector matches no known target,
/// or any target's recipe fails.
pub async fn dispatch(
    fqns: &[String],
    specs: Vec<TargetSpec>,
    engine: &Engine,
    root: &Path,
    include: &[String],
    exclude: &[String],
    workers: usize,
    format: OutputFormat,
) -> Result<()> {
    let requested = read_selectors(fqns)?;
    let dag = engine.link(specs, workers).await?;

    let current_package = current_package(root);
    let all_specs: Vec<TargetSpec> = dag.iter().cloned().collect();
    let mut candidates: Vec<String> = Vec::new();
    for raw in &requested {
        let selector = selector::parse(raw);
        let matches = selector::resolve(&selector, &all_specs, &current_package);
        if matches.is_empty() {
            return Err(CliError::usage(
                format!("selector `{raw}` matched no known target"),
                "check `kiln query alltargets` for known FQNs",
            ));
        }
        candidates.extend(matches.into_iter().map(String::from));
    }

    let selected = selector::apply_include_exclude(candidates, &all_specs, include, exclude);
    if selected.is_empty() {
        return Err(CliError::usage(
            "no targets selected after applying --include/--exclude",
            "loosen --include/--exclude or check the selector matched anything to begin with",
        ));
    }

    let closure = transitive_closure(&dag, &selected)?;

    let pool = kiln_worker::WorkerPool::new(workers);
    let mut ledger = kiln_scheduler::RunLedger::default();
    let result = kiln_scheduler::run_targets(
        &dag,
        &closure,
        &engine.out_root,
        root,
        &engine.cache,
        &engine.target_runner,
        &pool,
        &mut ledger,
    )
    .await;
    pool.done().await;
    result?;

    let mut ran: Vec<&str> = selected.iter().map(String::as_str).collect();
    ran.sort_unstable();
    print_result(format, &ran);
    Ok(())
}

fn read_selectors(fqns: &[String]) -> Result<Vec<String>> {
    if !fqns.is_empty() {
        return Ok(fqns.to_vec());
    }
    if std::io::stdin().is_terminal() {
        return Err(CliError::usage(
            "no target selectors given",
            "pass one or more selectors, or pipe newline-delimited selectors on stdin",
        ));
    }
    let mut input = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut input).map_err(CliError::Io)?;
    Ok(input.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

/// Best-effort package path for the invoking directory, for resolving
/// `:name` selectors: the cwd's path relative to `root`, posix-separated.
fn current_package(root: &Path) -> String {
    let cwd = std::env::current_dir().unwrap_or_else(|_| root.to_path_buf());
    cwd.strip_prefix(root)
        .map(|rel| rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect::<Vec<_>>().join("/"))
        .unwrap_or_default()
}

/// Every target reachable (transitively, inclusive) from `selected`, in no
/// particular order -- `kiln_scheduler::run_targets` re-derives the level
/// ordering from the `Dag` itself.
fn transitive_closure(dag: &Dag, selected: &[String]) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    for fqn in selected {
        for target in dag.build_order(fqn)? {
            seen.insert(target.fqn);
        }
    }
    Ok(seen.into_iter().collect())
}

fn print_result(format: OutputFormat, fqns: &[&str]) {
    if format == OutputFormat::Json {
        let envelope = OkEnvelope::new(serde_json::json!({ "ran": fqns }));
        println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
    } else {
        for fqn in fqns {
            println!("{fqn}");
        }
    }
}
