//! Host capability interface.
//!
//! Everything the engine does to the outside world (files, processes,
//! the terminal) goes through this narrow trait. One host object is shared
//! by a loop and all of its sub-tasks, so implementations must be safe for
//! concurrent use.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Output of a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// File metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Host identity, reported to the model in prompts and to users in banners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub name: String,
    pub version: String,
}

#[async_trait]
pub trait Host: Send + Sync {
    // --- Filesystem ---
    async fn read_file(&self, path: &str) -> Result<String, HostError>;
    async fn write_file(&self, path: &str, content: &str) -> Result<(), HostError>;
    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, HostError>;
    async fn stat(&self, path: &str) -> Result<FileStat, HostError>;
    async fn exists(&self, path: &str) -> Result<bool, HostError>;
    async fn delete(&self, path: &str) -> Result<(), HostError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), HostError>;

    /// Resolve `path` against the current working directory.
    async fn resolve_path(&self, path: &str) -> Result<PathBuf, HostError>;

    // --- Process environment ---
    async fn cwd(&self) -> Result<PathBuf, HostError>;
    async fn set_cwd(&self, path: &str) -> Result<(), HostError>;
    async fn env_var(&self, name: &str) -> Result<Option<String>, HostError>;

    /// Paths matching a glob pattern, relative to the working directory.
    async fn glob(&self, pattern: &str) -> Result<Vec<String>, HostError>;

    /// Run a shell command in the working directory.
    async fn exec(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, HostError>;

    // --- Terminal ---
    async fn write_terminal(&self, text: &str) -> Result<(), HostError>;

    /// Block until the user enters a line. Fails once input is closed.
    async fn read_line(&self, prompt: &str) -> Result<String, HostError>;

    // --- Identity ---
    async fn info(&self) -> Result<HostInfo, HostError>;
}

/// A host that supports nothing. Useful for tools that never touch the host
/// and for tests.
pub struct NullHost;

fn unsupported<T>(op: &str) -> Result<T, HostError> {
    Err(HostError::Unsupported(op.to_string()))
}

#[async_trait]
impl Host for NullHost {
    async fn read_file(&self, _path: &str) -> Result<String, HostError> {
        unsupported("read_file")
    }
    async fn write_file(&self, _path: &str, _content: &str) -> Result<(), HostError> {
        unsupported("write_file")
    }
    async fn list_dir(&self, _path: &str) -> Result<Vec<DirEntry>, HostError> {
        unsupported("list_dir")
    }
    async fn stat(&self, _path: &str) -> Result<FileStat, HostError> {
        unsupported("stat")
    }
    async fn exists(&self, _path: &str) -> Result<bool, HostError> {
        unsupported("exists")
    }
    async fn delete(&self, _path: &str) -> Result<(), HostError> {
        unsupported("delete")
    }
    async fn rename(&self, _from: &str, _to: &str) -> Result<(), HostError> {
        unsupported("rename")
    }
    async fn resolve_path(&self, _path: &str) -> Result<PathBuf, HostError> {
        unsupported("resolve_path")
    }
    async fn cwd(&self) -> Result<PathBuf, HostError> {
        unsupported("cwd")
    }
    async fn set_cwd(&self, _path: &str) -> Result<(), HostError> {
        unsupported("set_cwd")
    }
    async fn env_var(&self, _name: &str) -> Result<Option<String>, HostError> {
        Ok(None)
    }
    async fn glob(&self, _pattern: &str) -> Result<Vec<String>, HostError> {
        unsupported("glob")
    }
    async fn exec(&self, _command: &str, _timeout: Option<Duration>) -> Result<CommandOutput, HostError> {
        unsupported("exec")
    }
    async fn write_terminal(&self, _text: &str) -> Result<(), HostError> {
        Ok(())
    }
    async fn read_line(&self, _prompt: &str) -> Result<String, HostError> {
        unsupported("read_line")
    }
    async fn info(&self) -> Result<HostInfo, HostError> {
        Ok(HostInfo {
            name: "null".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_host_rejects_io() {
        let host = NullHost;
        assert!(matches!(
            host.read_file("a.txt").await,
            Err(HostError::Unsupported(_))
        ));
        assert!(host.exec("ls", None).await.is_err());
        assert_eq!(host.env_var("HOME").await.unwrap(), None);
        assert_eq!(host.info().await.unwrap().name, "null");
    }

    #[test]
    fn command_output_success() {
        let out = CommandOutput {
            stdout: "ok".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(out.success());
    }
}
