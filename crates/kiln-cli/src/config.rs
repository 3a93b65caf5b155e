//! `kiln.toml` (with `KILN_*` env overrides) resolution.
//!
//! Grounded on `kiln-cache`'s own `root()`: a pure, inputs-struct resolver
//! (`Config::from_inputs`) wrapped by a thin real-environment entry point
//! (`Config::load`), mirroring `cuenv-workspaces`'
//! `discovery/cargo_toml.rs`'s `serde::Deserialize` struct + `toml::from_str`
//! for the file itself. Unlike the cache root, a missing `kiln.toml` is not
//! an error: every field falls back to a documented default.

use crate::error::{CliError, Result};
use crate::output::OutputFormat;
use kiln_sandbox::StagingMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// On-disk shape of `kiln.toml`. Every field is optional; absence means
/// "use the built-in default".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    workers: Option<usize>,
    sandbox_mode: Option<String>,
    output_format: Option<String>,
    cache_order: Option<String>,
    #[serde(default)]
    cache_tiers: Vec<TierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TierConfig {
    name: String,
    role: String,
    kind: String,
    uri: String,
}

/// How the effective tier order is decided: by measured latency (default,
/// see [`kiln_cache::rank_tiers`]) or in the declared file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrderMode {
    /// Rank by measured latency, local tiers first, memoized to disk.
    Latency,
    /// Use exactly the order tiers were declared in `kiln.toml`.
    Declared,
}

/// One configured external cache tier, resolved from `kiln.toml`.
#[derive(Debug, Clone)]
pub struct ResolvedTier {
    /// Display name, used in logs and `TierFailed` errors.
    pub name: String,
    /// Primary (shared) or secondary (private); at most one secondary is
    /// retained in the effective list.
    pub role: kiln_cache::TierRole,
    /// Tier backend: filesystem path or gRPC endpoint URI.
    pub kind: TierKind,
}

/// Which transport a configured tier uses.
#[derive(Debug, Clone)]
pub enum TierKind {
    /// A filesystem-backed tier rooted at this path.
    Fs(PathBuf),
    /// A gRPC object-cache endpoint at this URI.
    Object(String),
}

/// Fully resolved configuration: file values with `KILN_*` env overrides
/// layered on top, and every field defaulted.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker pool size; `0` means unbounded (one job per ready target).
    pub workers: usize,
    /// Default input-staging mode for the host sandbox.
    pub sandbox_mode: StagingMode,
    /// Default CLI output format when `--format` isn't passed.
    pub output_format: OutputFormat,
    /// How to order configured external cache tiers.
    pub cache_order: CacheOrderMode,
    /// Configured external tiers, at most one of them `Secondary`.
    pub cache_tiers: Vec<ResolvedTier>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            sandbox_mode: StagingMode::Copy,
            output_format: OutputFormat::Text,
            cache_order: CacheOrderMode::Latency,
            cache_tiers: Vec::new(),
        }
    }
}

impl Config {
    /// Load `kiln.toml` from `root` (if present) and layer `KILN_*`
    /// environment overrides on top.
    ///
    /// # Errors
    /// Returns [`CliError::Usage`] if `kiln.toml` exists but isn't valid
    /// TOML, or a tier entry names an unknown `role`/`kind`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("kiln.toml");
        let file_config = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                CliError::usage(
                    format!("invalid {}: {e}", path.display()),
                    "fix the TOML syntax or remove the file to use defaults",
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => return Err(CliError::Io(e)),
        };
        Self::from_file_config(file_config, &EnvOverrides::from_env())
    }

    fn from_file_config(file: FileConfig, env: &EnvOverrides) -> Result<Self> {
        let mut config = Config::default();

        if let Some(workers) = file.workers {
            config.workers = workers;
        }
        if let Some(mode) = &file.sandbox_mode {
            config.sandbox_mode = parse_sandbox_mode(mode)?;
        }
        if let Some(format) = &file.output_format {
            config.output_format = parse_output_format(format)?;
        }
        if let Some(order) = &file.cache_order {
            config.cache_order = parse_cache_order(order)?;
        }
        config.cache_tiers = resolve_tiers(&file.cache_tiers)?;

        if let Some(workers) = env.workers {
            config.workers = workers;
        }
        if let Some(mode) = &env.sandbox_mode {
            config.sandbox_mode = parse_sandbox_mode(mode)?;
        }
        if let Some(format) = &env.output_format {
            config.output_format = parse_output_format(format)?;
        }
        if let Some(order) = &env.cache_order {
            config.cache_order = parse_cache_order(order)?;
        }

        Ok(config)
    }
}

/// `KILN_*` environment overrides, split out so resolution stays testable
/// without touching the real process environment.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    workers: Option<usize>,
    sandbox_mode: Option<String>,
    output_format: Option<String>,
    cache_order: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            workers: std::env::var("KILN_WORKERS").ok().and_then(|s| s.parse().ok()),
            sandbox_mode: std::env::var("KILN_SANDBOX_MODE").ok(),
            output_format: std::env::var("KILN_OUTPUT_FORMAT").ok(),
            cache_order: std::env::var("KILN_CACHE_ORDER").ok(),
        }
    }
}

fn parse_sandbox_mode(value: &str) -> Result<StagingMode> {
    match value.to_ascii_lowercase().as_str() {
        "copy" => Ok(StagingMode::Copy),
        "link" => Ok(StagingMode::Link),
        other => Err(CliError::usage(
            format!("unknown sandbox-mode `{other}`"),
            "use `copy` or `link`",
        )),
    }
}

fn parse_output_format(value: &str) -> Result<OutputFormat> {
    match value.to_ascii_lowercase().as_str() {
        "json" => Ok(OutputFormat::Json),
        "text" => Ok(OutputFormat::Text),
        "rich" => Ok(OutputFormat::Rich),
        other => Err(CliError::usage(
            format!("unknown output-format `{other}`"),
            "use `json`, `text`, or `rich`",
        )),
    }
}

fn parse_cache_order(value: &str) -> Result<CacheOrderMode> {
    match value.to_ascii_lowercase().as_str() {
        "latency" => Ok(CacheOrderMode::Latency),
        "declared" => Ok(CacheOrderMode::Declared),
        other => Err(CliError::usage(
            format!("unknown cache-order `{other}`"),
            "use `latency` or `declared`",
        )),
    }
}

/// Resolve configured tiers, keeping at most one `Secondary` (the first
/// declared; later secondaries are dropped with a warning, per the spec's
/// team-shared-primary / individual-private-secondary split).
fn resolve_tiers(tiers: &[TierConfig]) -> Result<Vec<ResolvedTier>> {
    let mut resolved = Vec::new();
    let mut seen_secondary = false;

    for tier in tiers {
        let role = match tier.role.to_ascii_lowercase().as_str() {
            "primary" => kiln_cache::TierRole::Primary,
            "secondary" => kiln_cache::TierRole::Secondary,
            other => {
                return Err(CliError::usage(
                    format!("cache tier `{}` has unknown role `{other}`", tier.name),
                    "use `primary` or `secondary`",
                ));
            }
        };

        if role == kiln_cache::TierRole::Secondary {
            if seen_secondary {
                warn!(tier = %tier.name, "dropping extra secondary cache tier, at most one is retained");
                continue;
            }
            seen_secondary = true;
        }

        let kind = match tier.kind.to_ascii_lowercase().as_str() {
            "fs" => TierKind::Fs(PathBuf::from(&tier.uri)),
            "object" => TierKind::Object(tier.uri.clone()),
            other => {
                return Err(CliError::usage(
                    format!("cache tier `{}` has unknown kind `{other}`", tier.name),
                    "use `fs` or `object`",
                ));
            }
        };

        resolved.push(ResolvedTier {
            name: tier.name.clone(),
            role,
            kind,
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_the_file_is_empty() {
        let config = Config::from_file_config(FileConfig::default(), &EnvOverrides::default()).unwrap();
        assert_eq!(config.workers, 0);
        assert_eq!(config.sandbox_mode, StagingMode::Copy);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.cache_order, CacheOrderMode::Latency);
        assert!(config.cache_tiers.is_empty());
    }

    #[test]
    fn env_overrides_win_over_the_file() {
        let file = FileConfig {
            workers: Some(4),
            ..FileConfig::default()
        };
        let env = EnvOverrides {
            workers: Some(8),
            ..EnvOverrides::default()
        };
        let config = Config::from_file_config(file, &env).unwrap();
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn at_most_one_secondary_tier_is_retained() {
        let file = FileConfig {
            cache_tiers: vec![
                TierConfig {
                    name: "mine-1".into(),
                    role: "secondary".into(),
                    kind: "fs".into(),
                    uri: "/tmp/a".into(),
                },
                TierConfig {
                    name: "mine-2".into(),
                    role: "secondary".into(),
                    kind: "fs".into(),
                    uri: "/tmp/b".into(),
                },
            ],
            ..FileConfig::default()
        };
        let config = Config::from_file_config(file, &EnvOverrides::default()).unwrap();
        let secondaries = config
            .cache_tiers
            .iter()
            .filter(|t| t.role == kiln_cache::TierRole::Secondary)
            .count();
        assert_eq!(secondaries, 1);
        assert_eq!(config.cache_tiers[0].name, "mine-1");
    }

    #[test]
    fn unknown_sandbox_mode_is_a_usage_error() {
        let file = FileConfig {
            sandbox_mode: Some("teleport".into()),
            ..FileConfig::default()
        };
        assert!(Config::from_file_config(file, &EnvOverrides::default()).is_err());
    }
}
