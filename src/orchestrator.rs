use crate::credentials::{Credential, CredentialSource};
use crate::local::LocalResolver;
use crate::logging::{get_logger, LogCategory};
use crate::remote::{RemoteBackend, RemoteError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which resolver produced a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandSource {
    Remote,
    Local,
}

impl CommandSource {
    pub fn label(&self) -> &'static str {
        match self {
            CommandSource::Remote => "remote",
            CommandSource::Local => "local",
        }
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command: String,
    pub source: CommandSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedCommand),
    Unresolved,
}

/// Why the remote resolver was skipped or abandoned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CredentialMissing,
    CapabilityUnavailable,
    RemoteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolution: Resolution,
    pub notices: Vec<Notice>,
}

impl ResolutionReport {
    pub fn command(&self) -> Option<&ResolvedCommand> {
        match &self.resolution {
            Resolution::Resolved(resolved) => Some(resolved),
            Resolution::Unresolved => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no command matches this instruction")]
    NoMatch,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// One step of the fallback chain
#[async_trait]
pub trait Resolver: Send + Sync {
    fn source(&self) -> CommandSource;
    async fn resolve(&self, instruction: &str) -> Result<String, ResolveError>;
}

#[async_trait]
impl Resolver for LocalResolver {
    fn source(&self) -> CommandSource {
        CommandSource::Local
    }

    async fn resolve(&self, instruction: &str) -> Result<String, ResolveError> {
        LocalResolver::resolve(self, instruction).ok_or(ResolveError::NoMatch)
    }
}

/// Remote backend bound to the credential loaded for this resolution
struct RemoteAttempt<'a> {
    backend: &'a dyn RemoteBackend,
    credential: Credential,
}

#[async_trait]
impl Resolver for RemoteAttempt<'_> {
    fn source(&self) -> CommandSource {
        CommandSource::Remote
    }

    async fn resolve(&self, instruction: &str) -> Result<String, ResolveError> {
        crate::log_debug!(
            LogCategory::Remote,
            format!("Asking {} for a command", self.backend.name())
        );
        Ok(self.backend.complete(instruction, &self.credential).await?)
    }
}

/// Resolves an instruction remote-first, local-second.
///
/// The remote step only joins the chain when a credential is present and
/// TLS support was available at startup (`remote` is `Some`). Each resolver
/// runs at most once and the first command wins; a later resolver replaces,
/// never augments, an earlier failure.
pub struct Orchestrator {
    credentials: Box<dyn CredentialSource>,
    remote: Option<Arc<dyn RemoteBackend>>,
    local: Arc<LocalResolver>,
}

impl Orchestrator {
    pub fn new(
        credentials: Box<dyn CredentialSource>,
        remote: Option<Arc<dyn RemoteBackend>>,
        local: Arc<LocalResolver>,
    ) -> Self {
        Self {
            credentials,
            remote,
            local,
        }
    }

    pub fn remote_available(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn resolve(&self, instruction: &str) -> ResolutionReport {
        let mut notices = Vec::new();
        let credential = self.credentials.load();

        let remote_attempt = match (credential, self.remote.as_deref()) {
            (Some(credential), Some(backend)) => Some(RemoteAttempt { backend, credential }),
            (None, _) => {
                notices.push(Notice::CredentialMissing);
                None
            }
            (Some(_), None) => {
                notices.push(Notice::CapabilityUnavailable);
                None
            }
        };

        let mut chain: Vec<&dyn Resolver> = Vec::with_capacity(2);
        if let Some(attempt) = &remote_attempt {
            chain.push(attempt);
        }
        chain.push(self.local.as_ref());

        crate::log_debug!(
            LogCategory::Resolution,
            format!("Resolving instruction: {}", instruction)
        );

        let mut fallbacks = 0;
        for resolver in &chain {
            match resolver.resolve(instruction).await {
                Ok(command) => {
                    let source = resolver.source();
                    record_outcome(Some(source), fallbacks);
                    return ResolutionReport {
                        resolution: Resolution::Resolved(ResolvedCommand { command, source }),
                        notices,
                    };
                }
                Err(ResolveError::Remote(e)) => {
                    crate::log_warning!(
                        LogCategory::Remote,
                        format!("Remote resolution failed, falling back: {}", e)
                    );
                    notices.push(Notice::RemoteFailed(e.to_string()));
                    fallbacks += 1;
                }
                Err(ResolveError::NoMatch) => {
                    fallbacks += 1;
                }
            }
        }

        record_outcome(None, fallbacks);
        ResolutionReport {
            resolution: Resolution::Unresolved,
            notices,
        }
    }
}

fn record_outcome(source: Option<CommandSource>, fallbacks: usize) {
    if let Ok(logger) = get_logger() {
        if let Ok(logger_guard) = logger.lock() {
            let _ = logger_guard.log_resolution(source.map(|s| s.label()), fallbacks);
        }
    }
}
