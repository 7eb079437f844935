//! Logging infrastructure using `log` + `log4rs`.

mod consts;

pub use consts::*;

use crate::foundation::{NodeError, Result};
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::io::IsTerminal;
use std::path::Path;

const CONSOLE_APPENDER: &str = "stderr";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Initialize the node logger with optional file output.
///
/// # Arguments
/// - `log_dir`: Optional directory for log files. If `None` or blank, only console output is used.
/// - `filters`: Filter expression (e.g. `"info"`, `"oracle_node_core=debug"`, `"reqwest=debug"`, `"root=info"`).
///
/// # Filtering Strategy (Whitelist)
/// - Root level defaults to OFF (suppresses all external crates completely)
/// - `oracle_node_core` and `keystore_admin` are whitelisted at the requested app level (default INFO)
/// - Specific 3rd party crates are opted in via `<crate>=<level>` (e.g. `"rocksdb=info"`)
/// - *All* 3rd party logs are opted in by explicitly setting `root=<level>`
///
/// Notes:
/// - The logger is global; repeated calls are ignored.
/// - Console output goes to stderr.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<()> {
    let filters = LogFilters::parse(filters);

    let use_ansi = std::io::stderr().is_terminal();
    let console_pattern = if use_ansi { LOG_LINE_PATTERN_COLORED } else { LOG_LINE_PATTERN };

    let console = ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(console_pattern))).build();

    let mut config_builder = Config::builder().appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)));
    let mut root_appenders: Vec<&str> = vec![CONSOLE_APPENDER];

    if let Some(dir) = log_dir.map(str::trim).filter(|s| !s.is_empty()) {
        let dir = Path::new(dir);
        let file_appender = rolling_appender(dir, LOG_FILE_NAME)?;
        config_builder = config_builder.appender(Appender::builder().build(LOG_FILE_APPENDER, Box::new(file_appender)));
        root_appenders.push(LOG_FILE_APPENDER);

        let err_file_appender = rolling_appender(dir, ERR_LOG_FILE_NAME)?;
        config_builder = config_builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build(ERR_LOG_FILE_APPENDER, Box::new(err_file_appender)),
        );
        root_appenders.push(ERR_LOG_FILE_APPENDER);
    }

    let appender_names: Vec<String> = root_appenders.iter().map(|name| (*name).to_string()).collect();

    let whitelisted = WHITELISTED_CRATES.iter().filter(|name| !filters.pins(name)).map(|name| (name.to_string(), filters.app));
    for (module, level) in whitelisted.chain(filters.modules.iter().cloned()) {
        config_builder = config_builder.logger(Logger::builder().appenders(appender_names.clone()).additive(false).build(module, level));
    }

    let config = config_builder
        .build(Root::builder().appenders(root_appenders).build(filters.root.unwrap_or(LevelFilter::Off)))
        .map_err(|err| NodeError::ConfigError(format!("invalid logger config: {}", err)))?;
    let _ = log4rs::init_config(config);
    Ok(())
}

fn rolling_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender> {
    let archive_pattern = dir.join(format!("{file_name}.{{}}.gz"));
    let archive_pattern = archive_pattern
        .to_str()
        .ok_or_else(|| NodeError::ConfigError(format!("log dir is not valid utf-8: {}", dir.display())))?;
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(archive_pattern, LOG_FILE_MAX_ROLLS)
        .map_err(|err| NodeError::ConfigError(format!("log roller for {}: {}", file_name, err)))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build(dir.join(file_name), Box::new(policy))
        .map_err(|err| NodeError::ConfigError(format!("log file {}: {}", file_name, err)))
}

/// Parsed filter expression: bare levels set the app level, `root=` opts in third-party
/// crates, any other `module=level` pins one logger.
#[derive(Debug, PartialEq)]
struct LogFilters {
    app: LevelFilter,
    root: Option<LevelFilter>,
    modules: Vec<(String, LevelFilter)>,
}

impl LogFilters {
    fn parse(filters: &str) -> Self {
        let mut parsed = Self { app: LevelFilter::Info, root: None, modules: Vec::new() };
        let mut app_set = false;
        for part in filters.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            match part.split_once('=') {
                None => {
                    if let (false, Ok(level)) = (app_set, part.parse()) {
                        parsed.app = level;
                        app_set = true;
                    }
                }
                Some((module, level)) => {
                    let (module, Ok(level)) = (module.trim(), level.trim().parse::<LevelFilter>()) else {
                        continue;
                    };
                    match module {
                        "" => {}
                        "root" => {
                            parsed.root.get_or_insert(level);
                        }
                        module => parsed.modules.push((module.to_string(), level)),
                    }
                }
            }
        }
        parsed
    }

    fn pins(&self, module: &str) -> bool {
        self.modules.iter().any(|(pinned, _)| pinned == module)
    }
}
