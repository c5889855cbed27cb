use crate::logging::{LogCategory, LogContext};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File holding the API key, next to the executable
pub const CREDENTIAL_FILE_NAME: &str = ".env";

/// API key used to authenticate remote resolution calls.
///
/// Stored in plain text in the credential file; the `Debug` output never
/// shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(********)")
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("API key must not be empty")]
    EmptySecret,
    #[error("could not write {primary}: {primary_error}; could not write {fallback}: {fallback_error}")]
    WriteFailed {
        primary: PathBuf,
        primary_error: std::io::Error,
        fallback: PathBuf,
        fallback_error: std::io::Error,
    },
}

/// Where `save` ended up writing the key
#[derive(Debug, Clone, PartialEq)]
pub struct SavedLocation {
    pub path: PathBuf,
    pub used_fallback: bool,
}

/// Anything that can hand the orchestrator a credential
pub trait CredentialSource: Send + Sync {
    fn load(&self) -> Option<Credential>;
}

/// `.env`-file credential store.
///
/// Writes go to the executable's directory so the tool works from any
/// working directory; the current directory is the fallback.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    primary_dir: PathBuf,
    fallback_dir: PathBuf,
    key_name: String,
}

impl CredentialStore {
    pub fn new(primary_dir: PathBuf, fallback_dir: PathBuf, key_name: &str) -> Self {
        Self {
            primary_dir,
            fallback_dir,
            key_name: key_name.to_string(),
        }
    }

    /// Executable directory as primary, current directory as fallback
    pub fn from_environment(key_name: &str) -> Self {
        let fallback_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let primary_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| fallback_dir.clone());

        Self::new(primary_dir, fallback_dir, key_name)
    }

    pub fn primary_path(&self) -> PathBuf {
        self.primary_dir.join(CREDENTIAL_FILE_NAME)
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.fallback_dir.join(CREDENTIAL_FILE_NAME)
    }

    /// First credential found, primary location before fallback
    pub fn load(&self) -> Option<Credential> {
        let mut candidates = vec![self.primary_path()];
        let fallback = self.fallback_path();
        if fallback != candidates[0] {
            candidates.push(fallback);
        }

        candidates.iter().find_map(|path| self.read_key_from(path))
    }

    fn read_key_from(&self, path: &Path) -> Option<Credential> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => parse_key_line(&content, &self.key_name).map(Credential::new),
            Err(e) => {
                eprintln!("读取.env文件时出错: {}", e);
                crate::log_warning!(
                    LogCategory::Credential,
                    format!("Failed to read credential file {}: {}", path.display(), e),
                    LogContext::new().with_component("credentials").with_operation("load")
                );
                None
            }
        }
    }

    /// Create or overwrite the credential file with a single key line
    pub fn save(&self, secret: &str) -> Result<SavedLocation, CredentialError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }

        let line = format!("{}={}\n", self.key_name, secret);
        let primary = self.primary_path();

        let primary_error = match fs::write(&primary, &line) {
            Ok(()) => {
                self.log_saved(false);
                return Ok(SavedLocation {
                    path: primary,
                    used_fallback: false,
                });
            }
            Err(e) => e,
        };

        crate::log_warning!(
            LogCategory::Credential,
            format!("Could not write {}: {}", primary.display(), primary_error)
        );

        let fallback = self.fallback_path();
        match fs::write(&fallback, &line) {
            Ok(()) => {
                self.log_saved(true);
                Ok(SavedLocation {
                    path: fallback,
                    used_fallback: true,
                })
            }
            Err(fallback_error) => Err(CredentialError::WriteFailed {
                primary,
                primary_error,
                fallback,
                fallback_error,
            }),
        }
    }

    fn log_saved(&self, used_fallback: bool) {
        crate::log_info!(
            LogCategory::Credential,
            if used_fallback {
                "API key saved to fallback location"
            } else {
                "API key saved next to executable"
            },
            LogContext::new()
                .with_component("credentials")
                .with_operation("save")
                .with_success(true)
        );
    }
}

impl CredentialSource for CredentialStore {
    fn load(&self) -> Option<Credential> {
        CredentialStore::load(self)
    }
}

/// Value of the first `KEY=value` line for `key_name`; malformed lines are skipped
fn parse_key_line(content: &str, key_name: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| *key == key_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = "DEEPSEEK_API_KEY";

    fn store_in(primary: &TempDir, fallback: &TempDir) -> CredentialStore {
        CredentialStore::new(
            primary.path().to_path_buf(),
            fallback.path().to_path_buf(),
            KEY,
        )
    }

    #[test]
    fn test_load_missing_file_is_absent() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        assert_eq!(store_in(&primary, &fallback).load(), None);
    }

    #[test]
    fn test_set_then_load_round_trip() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let store = store_in(&primary, &fallback);

        let location = store.save("abc123").unwrap();

        assert_eq!(location.path, primary.path().join(".env"));
        assert!(!location.used_fallback);
        assert_eq!(
            fs::read_to_string(&location.path).unwrap(),
            "DEEPSEEK_API_KEY=abc123\n"
        );
        assert_eq!(store.load(), Some(Credential::new("abc123")));
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let store = store_in(&primary, &fallback);
        fs::write(store.primary_path(), "OTHER=1\nDEEPSEEK_API_KEY=old\n").unwrap();

        store.save("new").unwrap();

        assert_eq!(
            fs::read_to_string(store.primary_path()).unwrap(),
            "DEEPSEEK_API_KEY=new\n"
        );
    }

    #[test]
    fn test_save_falls_back_when_primary_unwritable() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        // A directory that does not exist cannot receive the file
        let store = CredentialStore::new(
            primary.path().join("missing").join("dir"),
            fallback.path().to_path_buf(),
            KEY,
        );

        let location = store.save("abc123").unwrap();

        assert!(location.used_fallback);
        assert_eq!(location.path, fallback.path().join(".env"));
        assert_eq!(store.load(), Some(Credential::new("abc123")));
    }

    #[test]
    fn test_save_reports_both_failures() {
        let root = TempDir::new().unwrap();
        let store = CredentialStore::new(
            root.path().join("a").join("b"),
            root.path().join("c").join("d"),
            KEY,
        );

        let err = store.save("abc123").unwrap_err();
        assert!(matches!(err, CredentialError::WriteFailed { .. }));
        assert!(err.to_string().contains("could not write"));
    }

    #[test]
    fn test_save_rejects_empty_secret() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let err = store_in(&primary, &fallback).save("   ").unwrap_err();
        assert!(matches!(err, CredentialError::EmptySecret));
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let store = store_in(&primary, &fallback);
        fs::write(store.primary_path(), "DEEPSEEK_API_KEY=primary\n").unwrap();
        fs::write(store.fallback_path(), "DEEPSEEK_API_KEY=fallback\n").unwrap();

        assert_eq!(store.load(), Some(Credential::new("primary")));
    }

    #[test]
    fn test_parse_key_line_ignores_malformed_lines() {
        let content = "# comment\ngarbage line\n  DEEPSEEK_API_KEY=sk-a=b  \nDEEPSEEK_API_KEY=second\n";
        assert_eq!(parse_key_line(content, KEY), Some("sk-a=b".to_string()));
    }

    #[test]
    fn test_parse_key_line_requires_exact_key() {
        assert_eq!(parse_key_line("MY_DEEPSEEK_API_KEY=x\n", KEY), None);
        assert_eq!(parse_key_line("DEEPSEEK_API_KEY=\n", KEY), None);
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let rendered = format!("{:?}", Credential::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
    }
}
