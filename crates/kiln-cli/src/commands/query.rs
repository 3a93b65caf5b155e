//! `query` subcommand dispatch: config, alltargets, graph, graphdot,
//! outdir, changes. Grounded on `heph`'s `cmd/query.go` command set.

use crate::cli::QuerySub;
use crate::engine::Engine;
use crate::error::{CliError, OkEnvelope, Result};
use crate::output::OutputFormat;
use crate::{graphviz, selector};
use kiln_dag::Dag;
use kiln_spec::TargetSpec;
use std::path::Path;

/// Run one `query` subcommand against `specs`, printing to stdout in the
/// requested [`OutputFormat`].
///
/// # Errors
/// Returns an error if linking, the git diff for `changes`, or target
/// lookup fails.
pub async fn dispatch(sub: &QuerySub, specs: Vec<TargetSpec>, engine: &Engine, root: &Path, workers: usize, format: OutputFormat) -> Result<()> {
    match sub {
        QuerySub::Config => {
            let body = serde_json::json!({
                "root": root.display().to_string(),
                "out_root": engine.out_root.display().to_string(),
                "workers": engine.config.workers,
                "sandbox_mode": format!("{:?}", engine.config.sandbox_mode),
                "output_format": engine.config.output_format.as_ref(),
                "cache_order": format!("{:?}", engine.config.cache_order),
                "cache_tiers": engine.config.cache_tiers.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
            });
            print_value(format, "config", body);
            Ok(())
        }
        QuerySub::Alltargets => {
            let dag = engine.link(specs, workers).await?;
            let mut fqns: Vec<&str> = dag.iter().map(|t| t.fqn.as_str()).collect();
            fqns.sort_unstable();
            print_list(format, &fqns);
            Ok(())
        }
        QuerySub::Graph { fqn } => {
            let dag = engine.link(specs, workers).await?;
            require_target(&dag, fqn)?;
            let mut deps = dag.descendants(fqn);
            deps.sort();
            print_list(format, &deps.iter().map(String::as_str).collect::<Vec<_>>());
            Ok(())
        }
        QuerySub::Graphdot => {
            let dag = engine.link(specs, workers).await?;
            let dot = graphviz::render(&dag);
            if format == OutputFormat::Json {
                print_value(format, "graphdot", serde_json::json!({ "dot": dot }));
            } else {
                print!("{dot}");
            }
            Ok(())
        }
        QuerySub::Outdir { fqn } => {
            let dag = engine.link(specs, workers).await?;
            require_target(&dag, fqn)?;
            let dir = engine.out_root.join(".sandbox").join(selector::sanitize_for_path(fqn));
            if format == OutputFormat::Json {
                print_value(format, "outdir", serde_json::json!({ "path": dir.display().to_string() }));
            } else {
                println!("{}", dir.display());
            }
            Ok(())
        }
        QuerySub::Changes { since } => {
            let dag = engine.link(specs, workers).await?;
            let affected = changed_targets(&dag, root, since)?;
            print_list(format, &affected.iter().map(String::as_str).collect::<Vec<_>>());
            Ok(())
        }
    }
}

fn require_target(dag: &Dag, fqn: &str) -> Result<()> {
    if dag.contains(fqn) {
        Ok(())
    } else {
        Err(CliError::usage(format!("target {fqn} not found"), "check `kiln query alltargets` for known FQNs"))
    }
}

fn print_list(format: OutputFormat, items: &[&str]) {
    if format == OutputFormat::Json {
        print_value(format, "targets", serde_json::json!(items));
    } else {
        for item in items {
            println!("{item}");
        }
    }
}

fn print_value(format: OutputFormat, _label: &str, body: serde_json::Value) {
    if format == OutputFormat::Json {
        let envelope = OkEnvelope::new(body);
        println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
    } else {
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    }
}

/// Port of `heph`'s `changesCmd`: diff `since...HEAD`, then attribute each
/// changed file to the first target whose hash-dep file path is a prefix
/// of it, removing that target from further consideration once matched.
fn changed_targets(dag: &Dag, root: &Path, since: &str) -> Result<Vec<String>> {
    let output = std::process::Command::new("git")
        .args(["--no-pager", "diff", "--name-only", &format!("{since}...HEAD")])
        .current_dir(root)
        .output()
        .map_err(CliError::Io)?;

    if !output.status.success() {
        return Err(CliError::usage(
            format!("git diff against {since} failed: {}", String::from_utf8_lossy(&output.stderr)),
            "pass a valid git ref that exists in this repository",
        ));
    }

    let affected_files: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .filter(|l| !l.is_empty())
        .collect();

    let mut remaining: Vec<&TargetSpec> = dag.iter().collect();
    let mut affected_targets = Vec::new();

    for affected_file in &affected_files {
        let mut matched_at = None;
        for (idx, target) in remaining.iter().enumerate() {
            let hash_dep_files = kiln_hash::effective_hash_deps(target);
            if hash_dep_files.iter().any(|f| affected_file.starts_with(f.as_str())) {
                matched_at = Some(idx);
                break;
            }
        }
        if let Some(idx) = matched_at {
            affected_targets.push(remaining.remove(idx).fqn.clone());
        }
    }

    Ok(affected_targets)
}
