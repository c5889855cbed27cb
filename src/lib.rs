//! Turns a short Chinese instruction into a PowerShell command, remote
//! model first and a static phrase table second, and optionally runs it.

pub mod config;
pub mod credentials;
pub mod error_handling;
pub mod execution;
pub mod local;
pub mod logging;
pub mod orchestrator;
pub mod remote;

pub use config::Config;
pub use credentials::{Credential, CredentialSource, CredentialStore};
pub use execution::{ExecutionOutput, ShellExecutor};
pub use local::{LocalMatch, LocalResolver};
pub use orchestrator::{CommandSource, Notice, Orchestrator, Resolution, ResolutionReport};
pub use remote::{RemoteBackend, RemoteError, RemoteResolver, RemoteSettings};
