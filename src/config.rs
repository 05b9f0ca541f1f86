//! CLI configuration and argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{MupError, Result};
use crate::upgrade::{PollSettings, UpgradeSettings};
use crate::version;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Upper bound of `--timeout-minutes` (one day).
const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;

/// Rolling Kubernetes version upgrade for Cluster API machines.
///
/// Upgrades the control plane machine first and waits for its node to rejoin
/// at the new version, then upgrades all remaining machines concurrently.
#[derive(Parser, Debug, Clone)]
#[command(name = "mup")]
#[command(about = "Rolling Kubernetes version upgrade for Cluster API machines")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Target Kubernetes version (e.g., 1.31.4)
    #[arg(short = 'v', long, env = "MUP_KUBERNETES_VERSION")]
    pub kubernetes_version: String,

    /// Path to the kubeconfig file [default: kube search path]
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Namespace holding the Machine resources
    #[arg(short, long, default_value = "default")]
    pub namespace: String,

    /// Seconds between readiness checks
    #[arg(long, default_value = "5")]
    pub poll_interval_seconds: u64,

    /// Minutes to wait for each machine to become ready
    #[arg(long, default_value = "10")]
    pub timeout_minutes: u64,

    /// Seconds to wait for cancelled workers before aborting them
    #[arg(long, default_value = "30")]
    pub shutdown_grace_seconds: u64,

    /// Show the upgrade plan without updating any machine
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MUP_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Application configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub target_version: String,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: String,
    pub upgrade: UpgradeSettings,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Create and validate config from CLI arguments.
    pub fn from_args(args: Args) -> Result<Self> {
        if args.poll_interval_seconds == 0 {
            return Err(MupError::InvalidConfig(
                "--poll-interval-seconds must be greater than 0".to_string(),
            ));
        }
        if args.timeout_minutes == 0 {
            return Err(MupError::InvalidConfig(
                "--timeout-minutes must be greater than 0".to_string(),
            ));
        }
        if args.namespace.trim().is_empty() {
            return Err(MupError::InvalidConfig("--namespace must not be empty".to_string()));
        }

        if args.timeout_minutes > MAX_TIMEOUT_MINUTES {
            return Err(MupError::InvalidConfig(format!(
                "--timeout-minutes must not exceed {MAX_TIMEOUT_MINUTES}"
            )));
        }
        let timeout_secs = args.timeout_minutes * 60;
        if args.poll_interval_seconds > timeout_secs {
            return Err(MupError::InvalidConfig(
                "--poll-interval-seconds must not exceed the timeout".to_string(),
            ));
        }

        let target_version = version::spec_version(&args.kubernetes_version)?;

        Ok(Self {
            target_version,
            kubeconfig: args.kubeconfig,
            context: args.context,
            namespace: args.namespace,
            upgrade: UpgradeSettings {
                poll: PollSettings {
                    interval: Duration::from_secs(args.poll_interval_seconds),
                    timeout: Duration::from_secs(timeout_secs),
                },
                shutdown_grace: Duration::from_secs(args.shutdown_grace_seconds),
                dry_run: args.dry_run,
            },
            log_level: args.log_level,
            log_format: args.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["mup", "--kubernetes-version", "1.2.3"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_poll_settings() {
        let config = Config::from_args(parse(&[])).unwrap();
        assert_eq!(config.target_version, "1.2.3");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.upgrade.poll, PollSettings::default());
        assert_eq!(config.upgrade.shutdown_grace, Duration::from_secs(30));
        assert!(!config.upgrade.dry_run);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_target_version_prefix_stripped() {
        let args = Args::try_parse_from(["mup", "-v", "v1.31.4"]).unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.target_version, "1.31.4");
    }

    #[test]
    fn test_custom_poll_settings() {
        let config = Config::from_args(parse(&[
            "--poll-interval-seconds",
            "10",
            "--timeout-minutes",
            "30",
            "--dry-run",
        ]))
        .unwrap();
        assert_eq!(config.upgrade.poll.interval, Duration::from_secs(10));
        assert_eq!(config.upgrade.poll.timeout, Duration::from_secs(1800));
        assert!(config.upgrade.dry_run);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Config::from_args(parse(&["--poll-interval-seconds", "0"]));
        assert!(matches!(result, Err(MupError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_args(parse(&["--timeout-minutes", "0"]));
        assert!(matches!(result, Err(MupError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let max = u64::MAX.to_string();
        let result = Config::from_args(parse(&["--timeout-minutes", &max]));
        assert!(matches!(result, Err(MupError::InvalidConfig(_))));

        let result = Config::from_args(parse(&["--timeout-minutes", "1441"]));
        assert!(matches!(result, Err(MupError::InvalidConfig(_))));

        let config = Config::from_args(parse(&["--timeout-minutes", "1440"])).unwrap();
        assert_eq!(config.upgrade.poll.timeout, Duration::from_secs(86_400));
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let max = u64::MAX.to_string();
        let result = Config::from_args(parse(&["--poll-interval-seconds", &max]));
        assert!(matches!(result, Err(MupError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_target_version_rejected() {
        let args = Args::try_parse_from(["mup", "-v", "latest"]).unwrap();
        assert!(matches!(
            Config::from_args(args),
            Err(MupError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_json_log_format() {
        let config = Config::from_args(parse(&["--log-format", "json"])).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
