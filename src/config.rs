use crate::logging::LogCategory;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Build output directory the tool was first developed in. Still the
/// default target for "add to PATH" requests that name no path.
pub const DEFAULT_APPEND_PATH: &str = "D:\\projects\\代码\\cai\\dist";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Name of the recognized line in the `.env` credential file
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// `null` disables the last-resort path for "add to PATH" requests
    #[serde(default = "default_append_path")]
    pub default_path: Option<String>,

    #[serde(default = "default_shell")]
    pub shell: String,

    /// Legacy code page used for shell output that is not valid UTF-8
    #[serde(default = "default_output_encoding")]
    pub output_encoding: String,
}

fn default_endpoint() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    10000 // 10 seconds
}

fn default_credential_key() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_append_path() -> Option<String> {
    Some(DEFAULT_APPEND_PATH.to_string())
}

fn default_shell() -> String {
    if cfg!(target_os = "windows") {
        "powershell".to_string()
    } else {
        "pwsh".to_string()
    }
}

fn default_output_encoding() -> String {
    "gbk".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout(),
            credential_key: default_credential_key(),
            default_path: default_append_path(),
            shell: default_shell(),
            output_encoding: default_output_encoding(),
        }
    }
}

impl Config {
    /// Load `<config_dir>/cai/config.json`, falling back to defaults when the
    /// file is missing, unreadable or invalid.
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if let Some(path) = &config_path {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(path) {
                    match serde_json::from_str::<Config>(&content) {
                        Ok(config) => {
                            if let Err(e) = Self::validate_config(&config) {
                                eprintln!("警告: 配置无效 ({})，使用默认配置。", e);
                                crate::log_warning!(
                                    LogCategory::Configuration,
                                    format!("Invalid configuration: {}", e)
                                );
                                return Self::default();
                            }
                            return config;
                        }
                        Err(e) => {
                            eprintln!("警告: 无法解析配置文件 ({})，使用默认配置。", e);
                            crate::log_warning!(
                                LogCategory::Configuration,
                                format!("Failed to parse configuration: {}", e)
                            );
                            return Self::default();
                        }
                    }
                }
            }
        }

        Self::create_default_config(config_path)
    }

    fn create_default_config(config_path: Option<PathBuf>) -> Self {
        let default_config = Self::default();

        if let Some(path) = config_path {
            if !path.exists() {
                if let Some(parent) = path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                if let Ok(content) = serde_json::to_string_pretty(&default_config) {
                    if fs::write(&path, content).is_ok() {
                        crate::log_info!(
                            LogCategory::Configuration,
                            "Default configuration written"
                        );
                    }
                }
            }
        }

        default_config
    }

    pub fn validate_config(config: &Config) -> Result<()> {
        if !config.endpoint.starts_with("https://") {
            return Err(anyhow!("endpoint must be an HTTPS URL"));
        }

        if config.model.trim().is_empty() {
            return Err(anyhow!("model name cannot be empty"));
        }

        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(anyhow!("temperature must be between 0 and 2"));
        }

        if config.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than 0"));
        }

        if config.request_timeout_ms == 0 {
            return Err(anyhow!("request_timeout_ms must be greater than 0"));
        }

        if config.request_timeout_ms > 60000 {
            return Err(anyhow!(
                "request_timeout_ms cannot exceed 60 seconds (60000ms)"
            ));
        }

        if config.credential_key.trim().is_empty() || config.credential_key.contains('=') {
            return Err(anyhow!("credential_key must be a non-empty name without '='"));
        }

        if config.shell.trim().is_empty() {
            return Err(anyhow!("shell cannot be empty"));
        }

        if encoding_rs::Encoding::for_label(config.output_encoding.as_bytes()).is_none() {
            return Err(anyhow!(
                "output_encoding '{}' is not a known encoding label",
                config.output_encoding
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Display current configuration in a user-friendly format
    pub fn display(&self, credential_present: bool) {
        println!("🤖 cai 配置:");
        println!("配置文件: {}", Self::get_config_path().map(|p| p.display().to_string()).unwrap_or_else(|| "不可用".to_string()));
        println!("API 地址: {}", self.endpoint);
        println!("模型: {}", self.model);
        println!("temperature: {}", self.temperature);
        println!("max_tokens: {}", self.max_tokens);
        println!("请求超时: {}ms", self.request_timeout_ms);
        println!(
            "API key ({}): {}",
            self.credential_key,
            if credential_present { "********" } else { "未设置" }
        );
        println!(
            "默认 PATH 目录: {}",
            self.default_path.as_deref().unwrap_or("无")
        );
        println!("Shell: {}", self.shell);
        println!("输出编码: {}", self.output_encoding);
    }

    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("cai");
            path.push("config.json");
            path
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_remote_contract() {
        let config = Config::default();

        assert_eq!(config.endpoint, "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.credential_key, "DEEPSEEK_API_KEY");
        assert_eq!(config.default_path.as_deref(), Some(DEFAULT_APPEND_PATH));
        assert_eq!(config.output_encoding, "gbk");
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_config_validation_plain_http_endpoint() {
        let mut config = Config::default();
        config.endpoint = "http://api.deepseek.com/v1/chat/completions".to_string();

        let result = Config::validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("HTTPS"));
    }

    #[test]
    fn test_config_validation_timeout_bounds() {
        let mut config = Config::default();

        config.request_timeout_ms = 0;
        assert!(Config::validate_config(&config).is_err());

        config.request_timeout_ms = 65000;
        assert!(Config::validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("cannot exceed 60 seconds"));

        config.request_timeout_ms = 5000;
        assert!(Config::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation_empty_model() {
        let mut config = Config::default();
        config.model = "  ".to_string();

        assert!(Config::validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("model name cannot be empty"));
    }

    #[test]
    fn test_config_validation_temperature_and_tokens() {
        let mut config = Config::default();
        config.temperature = 3.5;
        assert!(Config::validate_config(&config).is_err());

        let mut config = Config::default();
        config.max_tokens = 0;
        assert!(Config::validate_config(&config).is_err());
    }

    #[test]
    fn test_config_validation_unknown_encoding() {
        let mut config = Config::default();
        config.output_encoding = "klingon-8".to_string();

        assert!(Config::validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("klingon-8"));
    }

    #[test]
    fn test_config_validation_credential_key() {
        let mut config = Config::default();
        config.credential_key = "A=B".to_string();
        assert!(Config::validate_config(&config).is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let config: Config = serde_json::from_str(r#"{ "model": "deepseek-coder" }"#).unwrap();

        assert_eq!(config.model, "deepseek-coder");
        assert_eq!(config.max_tokens, 100);
        assert_eq!(config.request_timeout_ms, 10000);
        assert_eq!(config.default_path.as_deref(), Some(DEFAULT_APPEND_PATH));
    }

    #[test]
    fn test_default_path_can_be_disabled() {
        let config: Config = serde_json::from_str(r#"{ "default_path": null }"#).unwrap();
        assert_eq!(config.default_path, None);
    }

    #[test]
    fn test_config_serialization() {
        let json = serde_json::to_string_pretty(&Config::default()).unwrap();

        assert!(json.contains("endpoint"));
        assert!(json.contains("request_timeout_ms"));
        assert!(json.contains("default_path"));
        assert!(json.contains("output_encoding"));
    }
}
