//! The host-process [`kiln_scheduler::TargetRunner`]: stage inputs,
//! execute the recipe under `tokio::process::Command`, collect outputs.
//!
//! Grounded on `cuenv-core`'s `tasks::backend::HostBackend::execute`:
//! shell-wrapped vs. direct+args command construction, `cmd.env_clear()`
//! then re-applying a composed environment, and `Stdio::piped()` output
//! capture. `ProcessGuard`'s terminate-on-timeout reuses
//! `process_registry`'s SIGTERM-then-SIGKILL sequence, scoped to this one
//! run instead of a process-wide singleton.

use crate::error::{Error, Result};
use crate::process::ProcessGuard;
use crate::staging::{StagingMode, resolve_output_pattern, stage_inputs};
use async_trait::async_trait;
use kiln_scheduler::{RunContext, RunOutcome, TargetRunner};
use kiln_spec::{Recipe, TargetSpec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// Configuration shared by every run a [`HostRunner`] performs.
///
/// `codegen`/timeout are not yet fields on [`TargetSpec`] (see
/// `DESIGN.md`): they're supplied here at runner-construction time instead
/// of per-target, which is sufficient for one session's uniform policy but
/// should move onto the spec once per-target overrides are needed.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Root directory package-relative input/output paths resolve under.
    pub package_root: PathBuf,
    /// Hardlink vs. copy for staged inputs.
    pub staging_mode: StagingMode,
    /// Recipe wall-clock limit, if any.
    pub timeout: Option<Duration>,
}

/// Runs a target's recipe directly on the host, in its own staged sandbox
/// directory under the run's `out_root`.
pub struct HostRunner {
    config: SandboxConfig,
}

impl HostRunner {
    /// Build a runner with the given sandbox configuration.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    fn sandbox_dir(&self, out_root: &Path, fqn: &str) -> PathBuf {
        out_root.join(".sandbox").join(sanitize_fqn(fqn))
    }

    fn log_path(&self, out_root: &Path, fqn: &str) -> PathBuf {
        out_root.join(".logs").join(sanitize_fqn(fqn)).join("run.log")
    }

    fn composed_env(&self, target: &TargetSpec) -> BTreeMap<String, String> {
        let mut env = target.env.clone();
        for name in &target.pass_env {
            if let Ok(value) = std::env::var(name) {
                env.insert(name.clone(), value);
            }
        }
        env
    }

    async fn run_recipe(&self, target: &TargetSpec, out_root: &Path, sandbox_dir: &Path, argv: &[String]) -> Result<()> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };

        let mut cmd = match target.executor {
            kiln_spec::Executor::Bash => {
                let mut c = tokio::process::Command::new("bash");
                c.arg("-c").arg(argv.join(" "));
                c
            }
            kiln_spec::Executor::Exec => {
                let mut c = tokio::process::Command::new(program);
                c.args(args);
                c
            }
        };

        cmd.current_dir(sandbox_dir);
        cmd.env_clear();
        for (k, v) in self.composed_env(target) {
            cmd.env(k, v);
        }

        let log_path = self.log_path(out_root, &target.fqn);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        let log_file = std::fs::File::create(&log_path).map_err(|e| Error::io(e, &log_path, "create"))?;
        let log_file_err = log_file.try_clone().map_err(|e| Error::io(e, &log_path, "clone"))?;

        let mut child = cmd
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()
            .map_err(|source| Error::Process {
                fqn: target.fqn.clone(),
                operation: "spawn".to_string(),
                source,
            })?;

        let mut guard = ProcessGuard::new();
        if let Some(pid) = child.id() {
            guard.track(pid);
        }

        let status = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => result.map_err(|source| Error::Process {
                    fqn: target.fqn.clone(),
                    operation: "wait".to_string(),
                    source,
                })?,
                Err(_) => {
                    guard.terminate(Duration::from_secs(5)).await;
                    return Err(Error::Timeout {
                        fqn: target.fqn.clone(),
                        seconds: timeout.as_secs(),
                    });
                }
            },
            None => child.wait().await.map_err(|source| Error::Process {
                fqn: target.fqn.clone(),
                operation: "wait".to_string(),
                source,
            })?,
        };

        if !status.success() {
            return Err(Error::RecipeFailed {
                fqn: target.fqn.clone(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    fn collect_outputs(&self, target: &TargetSpec, sandbox_dir: &Path) -> Result<BTreeMap<String, Vec<(String, PathBuf)>>> {
        let mut staged = BTreeMap::new();
        for (name, patterns) in &target.outputs {
            let mut files = Vec::new();
            for pattern in patterns {
                files.extend(resolve_output_pattern(sandbox_dir, pattern)?);
            }
            if files.is_empty() {
                return Err(Error::MissingOutput {
                    fqn: target.fqn.clone(),
                    output: name.clone(),
                });
            }
            staged.insert(name.clone(), files);
        }
        Ok(staged)
    }
}

fn sanitize_fqn(fqn: &str) -> String {
    fqn.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn to_scheduler_err(fqn: &str, e: Error) -> kiln_scheduler::Error {
    kiln_scheduler::Error::RunFailed {
        fqn: fqn.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl TargetRunner for HostRunner {
    async fn run(&self, target: &TargetSpec, ctx: &RunContext) -> kiln_scheduler::Result<RunOutcome> {
        let sandbox_dir = self.sandbox_dir(&ctx.out_root, &target.fqn);
        std::fs::create_dir_all(&sandbox_dir)
            .map_err(|e| to_scheduler_err(&target.fqn, Error::io(e, &sandbox_dir, "create_dir_all")))?;

        match &target.recipe {
            Recipe::Tool => Ok(RunOutcome::default()),
            Recipe::Group => {
                // A group never runs, but it's a transparent alias for its
                // deps' outputs: merge them the same way the scheduler's own
                // ledger rebind does (later-dep-wins, by declared order).
                let mut staged_outputs = BTreeMap::new();
                for dep_fqn in &target.deps.targets {
                    if let Some(outputs) = ctx.dep_output_files.get(dep_fqn) {
                        staged_outputs.extend(outputs.clone());
                    }
                }
                Ok(RunOutcome {
                    staged_outputs,
                    log_file_path: None,
                })
            }
            Recipe::TextFile(content) => {
                let Some((name, _)) = target.outputs.iter().next() else {
                    return Ok(RunOutcome::default());
                };
                let dest = sandbox_dir.join(name);
                std::fs::write(&dest, content).map_err(|e| to_scheduler_err(&target.fqn, Error::io(e, &dest, "write")))?;
                let mut staged = BTreeMap::new();
                staged.insert(name.clone(), vec![(name.clone(), dest)]);
                Ok(RunOutcome {
                    staged_outputs: staged,
                    log_file_path: None,
                })
            }
            Recipe::Run(argv) => {
                let mut input_files: Vec<(PathBuf, PathBuf)> = target
                    .deps
                    .files
                    .iter()
                    .map(|rel| (self.config.package_root.join(rel), PathBuf::from(rel)))
                    .collect();
                // Every listed dependency target has no per-output selector
                // syntax on `Deps.targets` (see `DESIGN.md`), so all of its
                // declared outputs are staged, merged flat at their
                // archive-relative paths.
                for dep_fqn in &target.deps.targets {
                    if let Some(outputs) = ctx.dep_output_files.get(dep_fqn) {
                        for files in outputs.values() {
                            for (archive_rel, abs_path) in files {
                                input_files.push((abs_path.clone(), PathBuf::from(archive_rel)));
                            }
                        }
                    }
                }
                stage_inputs(&sandbox_dir, &input_files, self.config.staging_mode)
                    .map_err(|e| to_scheduler_err(&target.fqn, e))?;

                ctx.status("running");
                self.run_recipe(target, &ctx.out_root, &sandbox_dir, argv)
                    .await
                    .map_err(|e| to_scheduler_err(&target.fqn, e))?;

                let staged_outputs = self
                    .collect_outputs(target, &sandbox_dir)
                    .map_err(|e| to_scheduler_err(&target.fqn, e))?;

                Ok(RunOutcome {
                    staged_outputs,
                    log_file_path: Some(self.log_path(&ctx.out_root, &target.fqn)),
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_spec::{CachePolicy, Deps, Executor, SourceLocation};
    use std::collections::BTreeSet;

    fn base_target(fqn: &str, recipe: Recipe) -> TargetSpec {
        TargetSpec {
            fqn: fqn.to_string(),
            recipe,
            executor: Executor::Exec,
            deps: Deps::default(),
            hash_deps: None,
            tools: vec![],
            outputs: BTreeMap::new(),
            cache: CachePolicy::default(),
            labels: BTreeSet::new(),
            env: BTreeMap::new(),
            pass_env: vec![],
            gen: false,
            source: SourceLocation::default(),
        }
    }

    fn runner() -> (HostRunner, tempfile::TempDir) {
        let pkg_root = tempfile::tempdir().unwrap();
        (
            HostRunner::new(SandboxConfig {
                package_root: pkg_root.path().to_path_buf(),
                staging_mode: StagingMode::Copy,
                timeout: None,
            }),
            pkg_root,
        )
    }

    #[tokio::test]
    async fn group_targets_produce_no_staged_outputs() {
        let (runner, pkg) = runner();
        let out_root = tempfile::tempdir().unwrap();
        let target = base_target("//pkg:grp", Recipe::Group);
        let ctx = RunContext {
            out_root: out_root.path().to_path_buf(),
            package_root: pkg.path().to_path_buf(),
            dep_output_hashes: BTreeMap::new(),
            dep_output_files: BTreeMap::new(),
            status: None,
        };
        let outcome = runner.run(&target, &ctx).await.unwrap();
        assert!(outcome.staged_outputs.is_empty());
    }

    #[tokio::test]
    async fn text_file_recipe_writes_its_content() {
        let (runner, pkg) = runner();
        let out_root = tempfile::tempdir().unwrap();
        let mut target = base_target("//pkg:gen-file", Recipe::TextFile("hello".to_string()));
        target.outputs.insert("out.txt".to_string(), vec!["out.txt".to_string()]);
        let ctx = RunContext {
            out_root: out_root.path().to_path_buf(),
            package_root: pkg.path().to_path_buf(),
            dep_output_hashes: BTreeMap::new(),
            dep_output_files: BTreeMap::new(),
            status: None,
        };
        let outcome = runner.run(&target, &ctx).await.unwrap();
        let (_, path) = &outcome.staged_outputs["out.txt"][0];
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn run_recipe_collects_declared_output() {
        let (runner, pkg) = runner();
        let out_root = tempfile::tempdir().unwrap();
        let mut target = base_target(
            "//pkg:build",
            Recipe::Run(vec!["sh".to_string(), "-c".to_string(), "echo hi > out.txt".to_string()]),
        );
        target.outputs.insert("out".to_string(), vec!["out.txt".to_string()]);
        let ctx = RunContext {
            out_root: out_root.path().to_path_buf(),
            package_root: pkg.path().to_path_buf(),
            dep_output_hashes: BTreeMap::new(),
            dep_output_files: BTreeMap::new(),
            status: None,
        };
        let outcome = runner.run(&target, &ctx).await.unwrap();
        assert_eq!(outcome.staged_outputs["out"].len(), 1);
    }

    #[tokio::test]
    async fn dependency_target_outputs_are_staged_alongside_file_deps() {
        let (runner, pkg) = runner();
        let out_root = tempfile::tempdir().unwrap();

        let dep_out_dir = tempfile::tempdir().unwrap();
        let dep_file = dep_out_dir.path().join("dep.bin");
        std::fs::write(&dep_file, b"dep-contents").unwrap();

        let mut dep_output_files = BTreeMap::new();
        dep_output_files.insert(
            "//pkg:dep".to_string(),
            BTreeMap::from([("bin".to_string(), vec![("dep.bin".to_string(), dep_file)])]),
        );

        let mut target = base_target(
            "//pkg:build",
            Recipe::Run(vec![
                "sh".to_string(),
                "-c".to_string(),
                "cp dep.bin out.txt".to_string(),
            ]),
        );
        target.deps.targets.push("//pkg:dep".to_string());
        target.outputs.insert("out".to_string(), vec!["out.txt".to_string()]);

        let ctx = RunContext {
            out_root: out_root.path().to_path_buf(),
            package_root: pkg.path().to_path_buf(),
            dep_output_hashes: BTreeMap::new(),
            dep_output_files,
            status: None,
        };
        let outcome = runner.run(&target, &ctx).await.unwrap();
        let (_, path) = &outcome.staged_outputs["out"][0];
        assert_eq!(std::fs::read_to_string(path).unwrap(), "dep-contents");
    }

    #[tokio::test]
    async fn missing_declared_output_is_an_error() {
        let (runner, pkg) = runner();
        let out_root = tempfile::tempdir().unwrap();
        let mut target = base_target("//pkg:build", Recipe::Run(vec!["true".to_string()]));
        target.outputs.insert("out".to_string(), vec!["never-written.txt".to_string()]);
        let ctx = RunContext {
            out_root: out_root.path().to_path_buf(),
            package_root: pkg.path().to_path_buf(),
            dep_output_hashes: BTreeMap::new(),
            dep_output_files: BTreeMap::new(),
            status: None,
        };
        let err = runner.run(&target, &ctx).await.unwrap_err();
        assert!(matches!(err, kiln_scheduler::Error::RunFailed { .. }));
    }
}
