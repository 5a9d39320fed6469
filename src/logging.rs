//! Logger setup.
//!
//! The terminal UI owns stdout, so in interactive mode records go to a rolling
//! file through log4rs. One-shot `--ask` runs log to stderr through env_logger.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Optional user-provided log4rs configuration, relative to the workspace root.
pub const LOG_CONFIG_PATH: &str = "config/log4rs.yaml";
const LOG_FILE: &str = "logs/assistant.log";
const ARCHIVE_PATTERN: &str = "logs/assistant.{}.log.gz";
const MAX_LOG_BYTES: u64 = 1024 * 1024;
const ARCHIVE_COUNT: u32 = 3;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {t} - {m}{n}";

/// Initializes file logging for the interactive UI.
///
/// `config/log4rs.yaml` wins when present; otherwise `logs/assistant.log` rolls
/// at 1 MiB and keeps three gzip archives.
pub fn init_file_logging(workspace_root: &Path) -> Result<()> {
    let yaml = workspace_root.join(LOG_CONFIG_PATH);
    if yaml.exists() {
        return log4rs::init_file(&yaml, Default::default())
            .with_context(|| format!("failed to load {}", yaml.display()));
    }
    let config = rolling_file_config(workspace_root, level_from_env())?;
    log4rs::init_config(config).context("failed to install the file logger")?;
    Ok(())
}

/// Builds the default rolling file configuration rooted at `workspace_root`.
pub fn rolling_file_config(workspace_root: &Path, level: LevelFilter) -> Result<Config> {
    let log_file: PathBuf = workspace_root.join(LOG_FILE);
    let archive_pattern = workspace_root.join(ARCHIVE_PATTERN);

    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), ARCHIVE_COUNT)
        .map_err(|err| anyhow::anyhow!("invalid archive pattern: {err}"))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(MAX_LOG_BYTES)),
        Box::new(roller),
    );
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(&log_file, Box::new(policy))
        .with_context(|| format!("failed to open {}", log_file.display()))?;

    Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(level))
        .context("invalid logger configuration")
}

/// Initializes stderr logging for one-shot runs. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_stderr_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // A logger may already be installed when embedded in tests.
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init();
}

fn level_from_env() -> LevelFilter {
    env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_file_appender() {
        let dir = tempfile::tempdir().unwrap();
        let config = rolling_file_config(dir.path(), LevelFilter::Debug).unwrap();

        assert_eq!(config.root().level(), LevelFilter::Debug);
        assert_eq!(config.appenders().len(), 1);
        assert_eq!(config.appenders()[0].name(), "file");
    }
}
