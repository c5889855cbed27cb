use crate::config::Config;
use crate::logging::{get_logger, LogCategory};
use encoding_rs::Encoding;
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown output encoding: {0}")]
    UnknownEncoding(String),
}

/// Captured result of one shell run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a resolved command through PowerShell, once, with both streams
/// captured. The command string is passed through verbatim.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: String,
    output_encoding: &'static Encoding,
}

impl ShellExecutor {
    pub fn new(program: &str, output_encoding: &str) -> Result<Self, ExecutionError> {
        let output_encoding = Encoding::for_label(output_encoding.trim().as_bytes())
            .ok_or_else(|| ExecutionError::UnknownEncoding(output_encoding.to_string()))?;

        Ok(Self {
            program: program.to_string(),
            output_encoding,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ExecutionError> {
        Self::new(&config.shell, &config.output_encoding)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn encoding_name(&self) -> &'static str {
        self.output_encoding.name()
    }

    pub fn run(&self, command: &str) -> Result<ExecutionOutput, ExecutionError> {
        crate::log_debug!(
            LogCategory::Execution,
            format!("Spawning {} -Command {}", self.program, command)
        );

        let started = Instant::now();
        let output = Command::new(&self.program)
            .args(["-Command", command])
            .output()
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let exit_code = output.status.code();
        if let Ok(logger) = get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_execution(&self.program, duration_ms, exit_code);
            }
        }

        Ok(ExecutionOutput {
            stdout: decode_output(&output.stdout, self.output_encoding),
            stderr: decode_output(&output.stderr, self.output_encoding),
            exit_code,
        })
    }
}

/// Decode with the configured code page only. GBK output is frequently
/// also valid UTF-8, so no UTF-8 detection is attempted; hosts whose shell
/// writes UTF-8 set `output_encoding` to `utf-8`. Undecodable sequences
/// become U+FFFD rather than failing.
pub fn decode_output(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{GBK, UTF_8};

    #[test]
    fn test_decode_gbk_that_is_also_valid_utf8() {
        let (bytes, _, _) = GBK.encode("一");
        assert_eq!(&bytes[..], &[0xD2, 0xBB]);
        assert!(std::str::from_utf8(&bytes).is_ok());

        assert_eq!(decode_output(&bytes, GBK), "一");
        assert_eq!(decode_output(b"", GBK), "");
    }

    #[test]
    fn test_decode_utf8_when_configured() {
        assert_eq!(decode_output("目录: C:\\".as_bytes(), UTF_8), "目录: C:\\");
    }

    #[test]
    fn test_decode_gbk_bytes() {
        let (bytes, _, had_errors) = GBK.encode("驱动器 C 中的卷没有标签。");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());

        assert_eq!(decode_output(&bytes, GBK), "驱动器 C 中的卷没有标签。");
    }

    #[test]
    fn test_new_accepts_known_labels() {
        let executor = ShellExecutor::new("powershell", "gbk").unwrap();
        assert_eq!(executor.program(), "powershell");
        assert_eq!(executor.encoding_name(), "GBK");

        assert!(ShellExecutor::new("pwsh", " utf-8 ").is_ok());
    }

    #[test]
    fn test_unknown_encoding_label() {
        let err = ShellExecutor::new("powershell", "klingon").unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownEncoding(label) if label == "klingon"));
    }

    #[test]
    fn test_from_config_defaults() {
        let executor = ShellExecutor::from_config(&Config::default()).unwrap();
        assert_eq!(executor.encoding_name(), "GBK");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let executor = ShellExecutor::new("cai-no-such-shell-4b1f", "gbk").unwrap();
        let err = executor.run("dir").unwrap_err();

        match err {
            ExecutionError::Spawn { program, .. } => assert_eq!(program, "cai-no-such-shell-4b1f"),
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[test]
    fn test_output_success_flag() {
        let output = ExecutionOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert!(output.success());
        assert!(!ExecutionOutput { exit_code: Some(1), ..output.clone() }.success());
        assert!(!ExecutionOutput { exit_code: None, ..output }.success());
    }
}
