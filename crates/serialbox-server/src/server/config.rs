use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use serialbox::{OverlapCheck, SerialBoxConfig, rules::RuleConfig};

use super::executors::DEFAULT_EXPAND_LIMIT;

/// How sibling region ranges are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverlapArg {
    /// Only a region's start point may not fall inside a sibling.
    StartPoint,
    /// Closed intervals may not intersect at all.
    Interval,
}

impl From<OverlapArg> for OverlapCheck {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::StartPoint => Self::StartPoint,
            OverlapArg::Interval => Self::Interval,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    /// Address to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    /// JSON file holding the rule configuration. The built-in rules apply
    /// when absent.
    #[arg(long, env = "RULES_CONFIG")]
    pub rules_config: Option<PathBuf>,

    #[arg(long, env = "OVERLAP_CHECK", value_enum, default_value = "start-point")]
    pub overlap_check: OverlapArg,

    /// Request threshold given to pools created without one. Zero disables
    /// the limit.
    #[arg(long, env = "DEFAULT_REQUEST_THRESHOLD", default_value_t = 50_000)]
    pub default_request_threshold: u64,

    /// JSON fixture of pools, regions and response rules to load at startup.
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Largest block the `expand` response rule lists.
    #[arg(long, env = "EXPAND_LIMIT", default_value_t = DEFAULT_EXPAND_LIMIT)]
    pub expand_limit: u64,

    /// Seconds to wait for in-flight requests after a shutdown signal.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 10)]
    pub shutdown_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub serialbox: SerialBoxConfig,
    pub seed_file: Option<PathBuf>,
    pub expand_limit: u64,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args
            .server_addr
            .parse()
            .with_context(|| format!("invalid SERVER_ADDR `{}`", args.server_addr))?;

        if args.shutdown_timeout == 0 {
            bail!("SHUTDOWN_TIMEOUT must be at least one second");
        }

        let rules = match &args.rules_config {
            Some(path) => load_rules(path)?,
            None => RuleConfig::default(),
        };

        if let Some(seed) = &args.seed_file {
            if !seed.is_file() {
                bail!("SEED_FILE `{}` does not exist", seed.display());
            }
        }

        Ok(Self {
            server_addr,
            serialbox: SerialBoxConfig {
                rules,
                overlap_check: args.overlap_check.into(),
                default_request_threshold: args.default_request_threshold,
            },
            seed_file: args.seed_file,
            expand_limit: args.expand_limit,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

fn load_rules(path: &Path) -> anyhow::Result<RuleConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read RULES_CONFIG `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid rule configuration in `{}`", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        CliArgs::parse_from(["serialbox-server"].iter().chain(extra))
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::try_from(args(&[])).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.serialbox, SerialBoxConfig::default());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert!(config.seed_file.is_none());
        assert_eq!(config.expand_limit, DEFAULT_EXPAND_LIMIT);
    }

    #[test]
    fn overrides() {
        let config = ServerConfig::try_from(args(&[
            "--server-addr",
            "127.0.0.1:9000",
            "--overlap-check",
            "interval",
            "--default-request-threshold",
            "0",
            "--expand-limit",
            "25",
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
        assert_eq!(config.serialbox.overlap_check, OverlapCheck::Interval);
        assert_eq!(config.serialbox.default_request_threshold, 0);
        assert_eq!(config.expand_limit, 25);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ServerConfig::try_from(args(&["--server-addr", "nowhere"])).is_err());
        assert!(ServerConfig::try_from(args(&["--shutdown-timeout", "0"])).is_err());
        assert!(ServerConfig::try_from(args(&["--seed-file", "/does/not/exist.json"])).is_err());
        assert!(ServerConfig::try_from(args(&["--rules-config", "/does/not/exist.json"])).is_err());
    }
}
