use super::logrecord::{level_name, Logrecord};
use chrono::Local;
use colored::*;
use glob::glob;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// All levels, Silly (0) through Fatal (6).
const ALL_LEVELS: [i64; 7] = [6, 5, 4, 3, 2, 1, 0];

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
/// # Logger Local Options
///
/// Configuration options for the `LoggerLocal` instance, controlling where and how
/// log messages are output.
pub struct LoggerLocalOptions {
    /// A list of log levels that should be printed to the TTY (console).
    pub use_tty: Option<Vec<i64>>,
    /// A list of log levels that should be written to a log file.
    pub use_file: Option<Vec<i64>>,
    /// The directory where log files should be stored. If `None`, defaults to the executable's directory.
    pub log_dir: Option<PathBuf>,
}

impl LoggerLocalOptions {
    /// Console output for `min_level` and above, no file.
    pub fn tty_from(min_level: i64) -> Self {
        Self {
            use_tty: Some(ALL_LEVELS.iter().copied().filter(|l| *l >= min_level).collect()),
            use_file: None,
            log_dir: None,
        }
    }
}

pub struct LoggerLocal {
    /// The name of the application associated with this logger instance.
    app_name: String,
    /// Configuration options determining logging behavior.
    options: LoggerLocalOptions,
    /// The path to the currently active log file, if file logging is enabled.
    current_log_file: Option<PathBuf>,
}

impl LoggerLocal {
    /// Rotates log files for a given application and log directory.
    ///
    /// Keeps only the most recent log file (by the timestamp in its name) and
    /// deletes the rest.
    fn rotate_logs(app_name: &str, log_dir: &Path) {
        let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
        let mut log_files: Vec<PathBuf> = match glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(e) => {
                eprintln!("Invalid log rotation pattern {}: {}", pattern, e);
                return;
            }
        };

        // Newest first; names embed a sortable timestamp.
        log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        for old_file in log_files.iter().skip(1) {
            if let Err(e) = std::fs::remove_file(old_file) {
                eprintln!("Error deleting old log file {}: {}", old_file.display(), e);
            }
        }
    }

    /// Creates a new `LoggerLocal` instance.
    ///
    /// If file logging is enabled, it ensures the log directory exists,
    /// rotates old logs, and sets up the current log file path.
    ///
    /// # Arguments
    /// * `app_name` - The name of the application using this logger.
    /// * `options` - Optional `LoggerLocalOptions`. If `None`, TTY and file
    ///   logging are enabled for all levels.
    pub fn new(app_name: String, options: Option<LoggerLocalOptions>) -> Self {
        let default_options = LoggerLocalOptions {
            use_tty: Some(ALL_LEVELS.to_vec()),
            use_file: Some(ALL_LEVELS.to_vec()),
            log_dir: None,
        };
        let opts = options.unwrap_or(default_options);

        let mut logger = Self {
            app_name: app_name.clone(),
            options: opts,
            current_log_file: None,
        };

        if logger.options.use_file.is_some() {
            let log_base_dir = logger.options.log_dir.clone().unwrap_or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                    .unwrap_or_else(|| PathBuf::from("."))
            });

            if let Err(e) = std::fs::create_dir_all(&log_base_dir) {
                eprintln!("Error creating log directory {}: {}", log_base_dir.display(), e);
            }

            LoggerLocal::rotate_logs(&app_name, &log_base_dir);

            let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
            let current_log_filename = format!("{}-{}.log", app_name, timestamp);
            logger.current_log_file = Some(log_base_dir.join(current_log_filename));
        }

        logger
    }

    /// A logger that discards everything. Used by tests and library callers
    /// that bring their own logging.
    pub fn silent(app_name: &str) -> Self {
        Self::new(
            app_name.to_string(),
            Some(LoggerLocalOptions {
                use_tty: None,
                use_file: None,
                log_dir: None,
            }),
        )
    }

    /// Path of the active log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }

    /// Logs a message with a specified level to the TTY and/or the log file,
    /// depending on the logger's configuration.
    ///
    /// # Arguments
    /// * `log_level` - The numeric log level (0 for Silly, 6 for Fatal).
    /// * `log_message` - The main message string to be logged.
    /// * `log_extras` - Additional structured data to include in the log.
    pub async fn log(&self, log_level: i64, log_message: &str, log_extras: Option<Value>) {
        let record = Logrecord::new(&self.app_name, log_level, log_message, log_extras);

        if let Some(tty_levels) = &self.options.use_tty {
            if tty_levels.contains(&log_level) {
                let ts = record.rfc9557.as_str().truecolor(128, 128, 128);
                let app_name_colored = format!("[{}]", self.app_name).truecolor(128, 128, 128);
                let colored_message = match log_level {
                    6 => log_message.bright_white().on_bright_red(),
                    5 => log_message.bright_red(),
                    4 => log_message.bright_yellow(),
                    3 => log_message.bright_green(),
                    2 => log_message.bright_white(),
                    1 => log_message.bright_cyan(),
                    _ => log_message.blue(),
                };

                println!("{}{}[{}]\n{}", ts, app_name_colored, level_name(log_level), colored_message);
                if record.has_tags() {
                    if let Ok(tags_str) = serde_json::to_string(&record.tags) {
                        println!("{}{}{}", ts, app_name_colored, tags_str.truecolor(128, 128, 128));
                    }
                }
            }
        }

        if let Some(file_levels) = &self.options.use_file {
            if file_levels.contains(&log_level) {
                if let Some(log_file_path) = &self.current_log_file {
                    match serde_json::to_string(&record) {
                        Ok(line) => {
                            let written = OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(log_file_path)
                                .and_then(|mut file| writeln!(file, "{}", line));
                            if let Err(e) = written {
                                eprintln!("Error writing log file {}: {}", log_file_path.display(), e);
                            }
                        }
                        Err(e) => eprintln!("Error serializing log record: {}", e),
                    }
                }
            }
        }
    }

    /// Logs a message at the "Silly" (level 0) log level.
    pub async fn silly(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(0, log_message, log_extras).await;
    }

    /// Logs a message at the "Trace" (level 1) log level.
    pub async fn trace(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(1, log_message, log_extras).await;
    }

    /// Logs a message at the "Debug" (level 2) log level.
    ///
    /// Used for request URLs and per-attempt details.
    pub async fn debug(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(2, log_message, log_extras).await;
    }

    /// Logs a message at the "Info" (level 3) log level.
    pub async fn info(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(3, log_message, log_extras).await;
    }

    /// Logs a message at the "Warn" (level 4) log level.
    ///
    /// Used for recoverable conditions such as a token refresh.
    pub async fn warn(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(4, log_message, log_extras).await;
    }

    /// Logs a message at the "Error" (level 5) log level.
    pub async fn error(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(5, log_message, log_extras).await;
    }

    /// Logs a message at the "Fatal" (level 6) log level.
    pub async fn fatal(&self, log_message: &str, log_extras: Option<Value>) {
        self.log(6, log_message, log_extras).await;
    }
}
