use colored::*;
use std::fmt;
use std::path::Path;
use crate::credentials::CredentialError;
use crate::execution::ExecutionError;
use crate::logging::{get_logger, LogCategory, LogContext};
use crate::remote::RemoteError;

/// Failure shown to the user, with suggestions on what to do next
#[derive(Debug, Clone)]
pub struct UserFriendlyError {
    pub error_type: ErrorType,
    pub message: String,
    pub suggestions: Vec<String>,
    pub technical_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorType {
    CredentialMissing,
    CapabilityUnavailable,
    RemoteTransport,
    Unresolved,
    Execution,
    Configuration,
    General,
}

impl UserFriendlyError {
    pub fn new(error_type: ErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            suggestions: Vec::new(),
            technical_details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions.extend(suggestions);
        self
    }

    pub fn with_technical_details(mut self, details: String) -> Self {
        self.technical_details = Some(details);
        self
    }

    /// No resolver produced a command. `examples` are phrases the local
    /// table understands.
    pub fn unresolved(credential_file: &Path, examples: &[&str]) -> Self {
        let mut error = Self::new(
            ErrorType::Unresolved,
            "无法理解该指令，请尝试其他描述或设置API key以获得更好的支持".to_string(),
        )
        .with_suggestions(vec![
            "使用 cai --set \"your_api_key\" 设置DeepSeek API key".to_string(),
            format!(".env文件将保存在: {}", credential_file.display()),
        ]);

        if !examples.is_empty() {
            error = error.with_suggestion(format!("或使用内置指令，例如: {}", examples.join("、")));
        }
        error
    }

    fn title(&self) -> &'static str {
        match self.error_type {
            ErrorType::CredentialMissing => "未设置API key",
            ErrorType::CapabilityUnavailable => "SSL模块不可用",
            ErrorType::RemoteTransport => "API调用失败",
            ErrorType::Unresolved => "未识别的指令",
            ErrorType::Execution => "执行命令时出错",
            ErrorType::Configuration => "配置错误",
            ErrorType::General => "错误",
        }
    }

    fn icon(&self) -> &'static str {
        match self.error_type {
            ErrorType::CredentialMissing => "🔐",
            ErrorType::CapabilityUnavailable => "🔌",
            ErrorType::RemoteTransport => "🌐",
            ErrorType::Unresolved => "🔍",
            ErrorType::Execution => "💻",
            ErrorType::Configuration => "⚙️",
            ErrorType::General => "❌",
        }
    }

    pub fn display(&self) {
        // Unresolved is an expected outcome, not a failure worth logging as one
        if self.error_type != ErrorType::Unresolved {
            if let Ok(logger) = get_logger() {
                if let Ok(logger_guard) = logger.lock() {
                    let context = LogContext::new()
                        .with_component("error_handling")
                        .with_operation("display_error")
                        .with_error_code(&format!("{:?}", self.error_type))
                        .with_success(false);

                    let _ = logger_guard.log_error(
                        LogCategory::System,
                        format!("{:?}: {}", self.error_type, self.message),
                        Some(context),
                    );
                }
            }
        }

        eprintln!("{} {}: {}", self.icon(), self.title().bold().red(), self.message);

        if !self.suggestions.is_empty() {
            eprintln!();
            eprintln!("{} {}", "💡".cyan(), "建议:".bold().yellow());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", (i + 1).to_string().green(), suggestion);
            }
        }

        if let Some(details) = &self.technical_details {
            eprintln!();
            eprintln!("{} {}", "🔧".dimmed(), "技术细节:".dimmed());
            eprintln!("   {}", details.dimmed());
        }
    }
}

impl fmt::Display for UserFriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserFriendlyError {}

/// Map an error that reached the top level to something the user can act on.
/// Typed errors are matched first; anything else falls back to message sniffing.
pub fn enhance_error(error: &anyhow::Error) -> UserFriendlyError {
    if let Some(friendly) = error.downcast_ref::<UserFriendlyError>() {
        return friendly.clone();
    }

    if let Some(remote) = error.downcast_ref::<RemoteError>() {
        return from_remote_error(remote);
    }

    if let Some(credential) = error.downcast_ref::<CredentialError>() {
        return from_credential_error(credential);
    }

    if let Some(execution) = error.downcast_ref::<ExecutionError>() {
        return from_execution_error(execution);
    }

    let error_msg = error.to_string().to_lowercase();

    if error_msg.contains("config") {
        return UserFriendlyError::new(
            ErrorType::Configuration,
            "配置文件有问题".to_string(),
        )
        .with_suggestions(vec![
            "查看当前配置: cai --show-config".to_string(),
            "删除配置文件以恢复默认值".to_string(),
        ])
        .with_technical_details(error.to_string());
    }

    if error_msg.contains("timed out") || error_msg.contains("timeout") {
        return UserFriendlyError::new(
            ErrorType::RemoteTransport,
            "请求超时".to_string(),
        )
        .with_suggestion("检查网络连接后重试".to_string())
        .with_technical_details(error.to_string());
    }

    UserFriendlyError::new(
        ErrorType::General,
        "发生意外错误".to_string(),
    )
    .with_suggestions(vec![
        "重试该命令".to_string(),
        "使用 --debug 运行并查看日志文件".to_string(),
    ])
    .with_technical_details(error.to_string())
}

fn from_remote_error(error: &RemoteError) -> UserFriendlyError {
    let friendly = match error {
        RemoteError::CapabilityUnavailable(_) => UserFriendlyError::new(
            ErrorType::CapabilityUnavailable,
            "当前环境不支持HTTPS，无法调用API".to_string(),
        )
        .with_suggestion("将使用本地命令映射".to_string()),
        RemoteError::Status { status: 401, .. } | RemoteError::Status { status: 403, .. } => {
            UserFriendlyError::new(
                ErrorType::CredentialMissing,
                "API key 无效或已过期".to_string(),
            )
            .with_suggestion("重新设置API key: cai --set \"your_api_key\"".to_string())
        }
        _ => UserFriendlyError::new(
            ErrorType::RemoteTransport,
            "调用API失败".to_string(),
        )
        .with_suggestions(vec![
            "检查网络连接".to_string(),
            "稍后重试".to_string(),
        ]),
    };
    friendly.with_technical_details(error.to_string())
}

fn from_credential_error(error: &CredentialError) -> UserFriendlyError {
    match error {
        CredentialError::EmptySecret => UserFriendlyError::new(
            ErrorType::CredentialMissing,
            "API key 不能为空".to_string(),
        )
        .with_suggestion("用法: cai --set \"your_api_key\"".to_string()),
        CredentialError::WriteFailed { .. } => UserFriendlyError::new(
            ErrorType::Configuration,
            "无法保存API key".to_string(),
        )
        .with_suggestions(vec![
            "检查程序目录和当前目录的写入权限".to_string(),
            "换一个可写的目录运行 cai --set".to_string(),
        ])
        .with_technical_details(error.to_string()),
    }
}

fn from_execution_error(error: &ExecutionError) -> UserFriendlyError {
    let friendly = match error {
        ExecutionError::Spawn { program, .. } => UserFriendlyError::new(
            ErrorType::Execution,
            format!("无法启动 {}", program),
        )
        .with_suggestions(vec![
            "确认已安装PowerShell并在PATH中".to_string(),
            "使用 --dry-run 只查看生成的命令".to_string(),
        ]),
        ExecutionError::UnknownEncoding(label) => UserFriendlyError::new(
            ErrorType::Configuration,
            format!("未知的输出编码: {}", label),
        )
        .with_suggestion("在配置文件中把 output_encoding 设为 gbk 或 utf-8".to_string()),
    };
    friendly.with_technical_details(error.to_string())
}

pub fn display_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

pub fn display_warning(message: &str) {
    println!("{} {}", "⚠️".yellow(), message.yellow());
}

pub fn display_info(message: &str) {
    println!("{} {}", "💡".cyan(), message.dimmed());
}

pub fn display_tip(message: &str) {
    println!("{} {}: {}", "💡".cyan(), "提示".bold().cyan(), message.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_user_friendly_error_creation() {
        let error = UserFriendlyError::new(
            ErrorType::Execution,
            "Test execution error".to_string(),
        );

        assert_eq!(error.error_type, ErrorType::Execution);
        assert_eq!(error.message, "Test execution error");
        assert!(error.suggestions.is_empty());
        assert!(error.technical_details.is_none());
    }

    #[test]
    fn test_user_friendly_error_with_suggestions() {
        let error = UserFriendlyError::new(
            ErrorType::Configuration,
            "Config error".to_string(),
        )
        .with_suggestion("Try this".to_string())
        .with_suggestion("Or this".to_string());

        assert_eq!(error.suggestions, vec!["Try this", "Or this"]);
    }

    #[test]
    fn test_unresolved_guidance_mentions_set_and_location() {
        let location = PathBuf::from("C:\\tools\\cai\\.env");
        let error = UserFriendlyError::unresolved(&location, &["查看服务", "查看端口"]);

        assert_eq!(error.error_type, ErrorType::Unresolved);
        assert!(error.suggestions.iter().any(|s| s.contains("cai --set \"your_api_key\"")));
        assert!(error.suggestions.iter().any(|s| s.contains("C:\\tools\\cai\\.env")));
        assert!(error.suggestions.iter().any(|s| s.contains("查看服务、查看端口")));
    }

    #[test]
    fn test_unresolved_without_examples() {
        let error = UserFriendlyError::unresolved(Path::new(".env"), &[]);
        assert_eq!(error.suggestions.len(), 2);
        assert!(error.message.contains("设置API key"));
    }

    #[test]
    fn test_enhance_remote_timeout() {
        let error = anyhow::Error::new(RemoteError::Timeout(Duration::from_secs(10)));
        let enhanced = enhance_error(&error);

        assert_eq!(enhanced.error_type, ErrorType::RemoteTransport);
        assert!(enhanced.technical_details.unwrap().contains("timed out"));
    }

    #[test]
    fn test_enhance_remote_unauthorized() {
        let error = anyhow::Error::new(RemoteError::Status {
            status: 401,
            body: "invalid key".to_string(),
        });
        let enhanced = enhance_error(&error);

        assert_eq!(enhanced.error_type, ErrorType::CredentialMissing);
        assert!(enhanced.suggestions.iter().any(|s| s.contains("--set")));
    }

    #[test]
    fn test_enhance_capability_unavailable() {
        let error = anyhow::Error::new(RemoteError::CapabilityUnavailable("no tls".to_string()));
        assert_eq!(enhance_error(&error).error_type, ErrorType::CapabilityUnavailable);
    }

    #[test]
    fn test_enhance_credential_errors() {
        let empty = anyhow::Error::new(CredentialError::EmptySecret);
        assert_eq!(enhance_error(&empty).error_type, ErrorType::CredentialMissing);

        let failed = anyhow::Error::new(CredentialError::WriteFailed {
            primary: PathBuf::from("/ro/.env"),
            primary_error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            fallback: PathBuf::from("/ro2/.env"),
            fallback_error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        let enhanced = enhance_error(&failed);
        assert_eq!(enhanced.error_type, ErrorType::Configuration);
        assert!(enhanced.technical_details.unwrap().contains("/ro2/.env"));
    }

    #[test]
    fn test_enhance_execution_errors() {
        let spawn = anyhow::Error::new(ExecutionError::Spawn {
            program: "pwsh".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        let enhanced = enhance_error(&spawn);
        assert_eq!(enhanced.error_type, ErrorType::Execution);
        assert!(enhanced.message.contains("pwsh"));

        let encoding = anyhow::Error::new(ExecutionError::UnknownEncoding("x".to_string()));
        assert_eq!(enhance_error(&encoding).error_type, ErrorType::Configuration);
    }

    #[test]
    fn test_enhance_passes_friendly_error_through() {
        let original = UserFriendlyError::new(ErrorType::Unresolved, "nope".to_string());
        let enhanced = enhance_error(&anyhow::Error::new(original));
        assert_eq!(enhanced.error_type, ErrorType::Unresolved);
        assert_eq!(enhanced.message, "nope");
    }

    #[test]
    fn test_enhance_untyped_errors() {
        let config = enhance_error(&anyhow!("Invalid configuration: temperature"));
        assert_eq!(config.error_type, ErrorType::Configuration);

        let generic = enhance_error(&anyhow!("Some random error"));
        assert_eq!(generic.error_type, ErrorType::General);
        assert!(!generic.suggestions.is_empty());
    }

    #[test]
    fn test_error_display_trait() {
        let error = UserFriendlyError::new(ErrorType::General, "Test error".to_string());
        assert_eq!(format!("{}", error), "Test error");
    }
}
