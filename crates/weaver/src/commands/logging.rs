//! Logging initialization for the CLI.

use std::path::PathBuf;
use weaver_util::log::{self, LogConfig, LogLevel};

/// Initialize logging.
///
/// Logs go to stderr with `--print-logs`, otherwise to the log file. The
/// configured level applies unless `--verbose` asks for debug output.
/// Returns the log file path if logging to a file.
pub fn init_logging(
    verbose: bool,
    print_logs: bool,
    configured: Option<LogLevel>,
) -> Option<PathBuf> {
    let level = if verbose {
        LogLevel::Debug
    } else {
        configured.unwrap_or(LogLevel::Info)
    };

    log::init(LogConfig {
        print: print_logs,
        level,
        include_location: verbose,
        file: if print_logs {
            None
        } else {
            log::default_log_path()
        },
    })
}
