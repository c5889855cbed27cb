use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

/// Privacy-preserving file logger for cai
///
/// Instructions typed by the user and the API key are never written in
/// production mode. Only resolution outcomes, remote call timings, credential
/// store activity and execution status are recorded. Debug mode is opt-in
/// per run and clearly marks its entries.
pub struct PrivacyLogger {
    log_file_path: PathBuf,
    debug_mode: bool,
    writer: Arc<Mutex<Option<std::fs::File>>>,
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub context: Option<LogContext>,
    pub is_debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LogCategory {
    System,
    Configuration,
    Credential,
    Remote,
    Resolution,
    Execution,
    Debug,
}

/// Context information for log entries (privacy-safe)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    pub component: Option<String>,
    pub operation: Option<String>,
    pub duration_ms: Option<u64>,
    pub error_code: Option<String>,
    pub source: Option<String>,
    pub success: Option<bool>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error_code(mut self, error_code: &str) -> Self {
        self.error_code = Some(error_code.to_string());
        self
    }

    /// Which resolver produced (or failed to produce) the command
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }
}

fn redaction_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"/home/[^/\s]+", "/home/[USER]"),
            (r"/Users/[^/\s]+", "/Users/[USER]"),
            (r"(?i)[A-Z]:\\Users\\[^\\\s]+", "C:\\Users\\[USER]"),
            (r"[A-Z_]*API_KEY=\S+", "API_KEY=[REDACTED]"),
            (r"(?i)bearer\s+\S+", "Bearer [REDACTED]"),
            (r"sk-[A-Za-z0-9]{8,}", "sk-[REDACTED]"),
            (r"token=\S+", "token=[REDACTED]"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

impl PrivacyLogger {
    /// Create a logger writing to `<config_dir>/cai/cai.log`
    pub fn new() -> Result<Self> {
        let log_file_path = Self::get_log_file_path()?;
        Self::with_path(log_file_path)
    }

    /// Create a logger writing to an explicit file
    pub fn with_path(log_file_path: PathBuf) -> Result<Self> {
        if let Some(parent) = log_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            log_file_path,
            debug_mode: false,
            writer: Arc::new(Mutex::new(None)),
        })
    }

    /// Turn on debug entries for this process. Requested explicitly with `--debug`.
    pub fn enable_debug_mode(&mut self) -> Result<()> {
        self.debug_mode = true;
        self.log_warning(
            LogCategory::Debug,
            "DEBUG MODE ACTIVE: instructions and generated commands will be logged".to_string(),
            None,
        )
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn log_error(
        &self,
        category: LogCategory,
        message: String,
        context: Option<LogContext>,
    ) -> Result<()> {
        self.write_plain(LogLevel::Error, category, &message, context)
    }

    pub fn log_warning(
        &self,
        category: LogCategory,
        message: String,
        context: Option<LogContext>,
    ) -> Result<()> {
        self.write_plain(LogLevel::Warning, category, &message, context)
    }

    pub fn log_info(
        &self,
        category: LogCategory,
        message: String,
        context: Option<LogContext>,
    ) -> Result<()> {
        self.write_plain(LogLevel::Info, category, &message, context)
    }

    /// Only written when debug mode is on
    pub fn log_debug(
        &self,
        category: LogCategory,
        message: String,
        context: Option<LogContext>,
    ) -> Result<()> {
        if !self.debug_mode {
            return Ok(());
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Debug,
            category,
            message: format!("[DEBUG] {}", message),
            context,
            is_debug: true,
        };

        self.write_log_entry(&entry)
    }

    pub fn log_startup(&self, version: &str, os_info: &str) -> Result<()> {
        let context = LogContext::new()
            .with_component("system")
            .with_operation("startup");

        self.log_info(
            LogCategory::System,
            format!("cai {} started on {}", version, os_info),
            Some(context),
        )
    }

    /// Record one chat-completion call
    pub fn log_remote_call(&self, model: &str, duration_ms: u64, outcome: Option<&str>) -> Result<()> {
        let success = outcome.is_none();
        let mut context = LogContext::new()
            .with_component("remote")
            .with_operation("chat_completion")
            .with_duration_ms(duration_ms)
            .with_source(model)
            .with_success(success);
        if let Some(code) = outcome {
            context = context.with_error_code(code);
        }

        let level = if success { LogLevel::Info } else { LogLevel::Warning };
        let message = format!(
            "Remote {} chat_completion: {} ({}ms)",
            model,
            if success { "success" } else { "failed" },
            duration_ms
        );

        self.write_plain(level, LogCategory::Remote, &message, Some(context))
    }

    /// Record which terminal state a resolution reached
    pub fn log_resolution(&self, source: Option<&str>, fallbacks: usize) -> Result<()> {
        let mut context = LogContext::new()
            .with_component("orchestrator")
            .with_operation("resolve")
            .with_success(source.is_some());
        if let Some(source) = source {
            context = context.with_source(source);
        }

        let message = match source {
            Some(source) => format!("Resolved by {} resolver after {} fallback(s)", source, fallbacks),
            None => format!("Unresolved after {} fallback(s)", fallbacks),
        };

        self.log_info(LogCategory::Resolution, message, Some(context))
    }

    pub fn log_execution(&self, program: &str, duration_ms: u64, exit_code: Option<i32>) -> Result<()> {
        let success = exit_code == Some(0);
        let mut context = LogContext::new()
            .with_component("execution")
            .with_operation(program)
            .with_duration_ms(duration_ms)
            .with_success(success);
        if !success {
            let code = exit_code.map_or_else(|| "terminated".to_string(), |c| format!("exit_{}", c));
            context = context.with_error_code(&code);
        }

        let level = if success { LogLevel::Info } else { LogLevel::Warning };
        let message = format!("Execution via {} finished in {}ms", program, duration_ms);
        self.write_plain(level, LogCategory::Execution, &message, Some(context))
    }

    fn write_plain(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        context: Option<LogContext>,
    ) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            category,
            message: self.redact_sensitive_info(message),
            context,
            is_debug: false,
        };

        self.write_log_entry(&entry)
    }

    fn get_log_file_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;

        let mut log_path = config_dir;
        log_path.push("cai");
        log_path.push("cai.log");

        Ok(log_path)
    }

    fn write_log_entry(&self, entry: &LogEntry) -> Result<()> {
        let mut writer_guard = self
            .writer
            .lock()
            .map_err(|_| anyhow!("Failed to acquire log writer lock"))?;

        if writer_guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_file_path)?;
            *writer_guard = Some(file);
        }

        if let Some(ref mut file) = *writer_guard {
            let log_line = self.format_log_entry(entry);
            writeln!(file, "{}", log_line)?;
            file.flush()?;
        }

        Ok(())
    }

    fn format_log_entry(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
        let level = format!("{:?}", entry.level).to_uppercase();
        let category = format!("{:?}", entry.category).to_uppercase();

        let mut formatted = format!("[{}] {} {} {}", timestamp, level, category, entry.message);

        if let Some(ref context) = entry.context {
            let mut context_parts = Vec::new();

            if let Some(ref component) = context.component {
                context_parts.push(format!("component={}", component));
            }
            if let Some(ref operation) = context.operation {
                context_parts.push(format!("operation={}", operation));
            }
            if let Some(duration) = context.duration_ms {
                context_parts.push(format!("duration={}ms", duration));
            }
            if let Some(ref error_code) = context.error_code {
                context_parts.push(format!("error={}", error_code));
            }
            if let Some(ref source) = context.source {
                context_parts.push(format!("source={}", source));
            }
            if let Some(success) = context.success {
                context_parts.push(format!("success={}", success));
            }

            if !context_parts.is_empty() {
                formatted.push_str(&format!(" [{}]", context_parts.join(", ")));
            }
        }

        if entry.is_debug {
            formatted = format!("🐛 DEBUG: {}", formatted);
        }

        formatted
    }

    fn redact_sensitive_info(&self, message: &str) -> String {
        if self.debug_mode {
            return message.to_string();
        }

        redaction_rules()
            .iter()
            .fold(message.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            })
    }

    pub fn get_current_log_path(&self) -> &PathBuf {
        &self.log_file_path
    }
}

static GLOBAL_LOGGER: OnceLock<Arc<Mutex<PrivacyLogger>>> = OnceLock::new();

/// Initialize the global logger
pub fn init_logger() -> Result<()> {
    let logger = PrivacyLogger::new()?;
    let _ = GLOBAL_LOGGER.set(Arc::new(Mutex::new(logger)));
    Ok(())
}

/// Get the global logger instance
pub fn get_logger() -> Result<Arc<Mutex<PrivacyLogger>>> {
    GLOBAL_LOGGER
        .get()
        .cloned()
        .ok_or_else(|| anyhow!("Logger not initialized. Call init_logger() first."))
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_error($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_error($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_warning($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_warning($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_info($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_info($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_debug($category, $message.to_string(), None);
            }
        }
    };
}
