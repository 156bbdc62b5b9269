//! Layered CLI configuration: defaults, then `gantry.toml` (or `--config`),
//! then `GANTRY_*` environment variables, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use gantry_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::cli::GlobalArgs;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "gantry.toml";

/// Everything the `gantry` binary can be configured with.
///
/// ```toml
/// state_dir = "/var/lib/gantry"
///
/// [engine]
/// max_concurrency = 4
/// auto_rollback = true
///
/// [log]
/// level = "info"
/// format = "json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory holding persisted plans.
    pub state_dir: PathBuf,
    /// Engine tuning.
    pub engine: EngineConfig,
    /// Logger settings.
    pub log: gantry_log::Config,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".gantry"),
            engine: EngineConfig::default(),
            log: gantry_log::Config::default().with_level("warn"),
        }
    }
}

impl CliConfig {
    /// Resolve the full layering for this invocation.
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        let mut config = Self::from_figment(Self::figment(args.config.as_deref())?)?;
        config.apply(args);
        Ok(config)
    }

    /// Defaults, config file and environment, without flags.
    ///
    /// `GANTRY_LOG` sets the log level directly; nested keys use a double
    /// underscore, e.g. `GANTRY_ENGINE__MAX_CONCURRENCY=4`.
    pub fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => {
                bail!("config file {} does not exist", path.display());
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(
                Env::prefixed("GANTRY_")
                    .ignore(&["log", "log_format", "config"])
                    .split("__"),
            );
        if let Ok(level) = std::env::var("GANTRY_LOG") {
            figment = figment.merge(Serialized::default("log.level", level));
        }
        Ok(figment)
    }

    /// Extract a config from any provider stack.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("invalid configuration")
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, args: &GlobalArgs) {
        if let Some(dir) = &args.state_dir {
            self.state_dir.clone_from(dir);
        }
        if let Some(max) = args.max_concurrency {
            self.engine = self.engine.clone().with_max_concurrency(max);
        }
        if args.no_rollback {
            self.engine.auto_rollback = false;
        }
        if let Some(level) = &args.log_level {
            self.log.level.clone_from(level);
        }
        if let Some(format) = args.log_format {
            self.log = self.log.clone().with_format(format);
        }
    }
}

#[cfg(test)]
mod tests {
    use gantry_log::Format;
    use pretty_assertions::assert_eq;

    use super::*;

    fn layered(toml: &str) -> CliConfig {
        CliConfig::from_figment(
            Figment::from(Serialized::defaults(CliConfig::default())).merge(Toml::string(toml)),
        )
        .unwrap()
    }

    #[test]
    fn defaults_log_at_warn() {
        let config = CliConfig::default();
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.state_dir, PathBuf::from(".gantry"));
        assert!(config.engine.auto_rollback);
    }

    #[test]
    fn file_overrides_nested_sections() {
        let config = layered(
            r#"
            state_dir = "/var/lib/gantry"

            [engine]
            max_concurrency = 4
            auto_rollback = false

            [log]
            level = "debug"
            format = "json"
            "#,
        );
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/gantry"));
        assert_eq!(config.engine.max_concurrency, Some(4));
        assert!(!config.engine.auto_rollback);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, Format::Json);
    }

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(layered(""), CliConfig::default());
    }

    #[test]
    fn flags_win_over_file() {
        let mut config = layered("[engine]\nmax_concurrency = 4\n");
        config.apply(&GlobalArgs {
            state_dir: Some(PathBuf::from("/tmp/elsewhere")),
            max_concurrency: Some(0),
            no_rollback: true,
            log_level: Some("trace".to_owned()),
            log_format: Some(Format::Json),
            ..GlobalArgs::default()
        });
        assert_eq!(config.state_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.engine.max_concurrency, Some(1));
        assert!(!config.engine.auto_rollback);
        assert_eq!(config.log.level, "trace");
        assert!(!config.log.ansi);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = CliConfig::figment(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
