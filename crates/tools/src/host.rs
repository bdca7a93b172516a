//! Local machine implementation of the [`Host`] capability interface.
//!
//! Relative paths resolve against a working directory held by the host, so
//! `set_cwd` never touches the process-wide current directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tandem_core::error::HostError;
use tandem_core::host::{CommandOutput, DirEntry, FileStat, Host, HostInfo};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct LocalHost {
    cwd: RwLock<PathBuf>,
}

impl LocalHost {
    /// A host rooted at the process's current directory.
    pub fn new() -> Result<Self, HostError> {
        let cwd = std::env::current_dir().map_err(|e| HostError::io(".", e))?;
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: RwLock::new(cwd.into()),
        }
    }

    fn current_dir(&self) -> PathBuf {
        self.cwd
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir().join(path)
        }
    }
}

fn not_found_or_io(path: &Path, err: std::io::Error) -> HostError {
    if err.kind() == std::io::ErrorKind::NotFound {
        HostError::NotFound(path.display().to_string())
    } else {
        HostError::io(path.display(), err)
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn read_file(&self, path: &str) -> Result<String, HostError> {
        let full = self.resolve(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| not_found_or_io(&full, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), HostError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HostError::io(parent.display(), e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| HostError::io(full.display(), e))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, HostError> {
        let full = self.resolve(path);
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| not_found_or_io(&full, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| HostError::io(full.display(), e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<FileStat, HostError> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| not_found_or_io(&full, e))?;
        Ok(FileStat {
            size: meta.len(),
            is_dir: meta.is_dir(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, HostError> {
        let full = self.resolve(path);
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| HostError::io(full.display(), e))
    }

    async fn delete(&self, path: &str) -> Result<(), HostError> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| not_found_or_io(&full, e))?;
        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        result.map_err(|e| HostError::io(full.display(), e))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), HostError> {
        let (from, to) = (self.resolve(from), self.resolve(to));
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| not_found_or_io(&from, e))
    }

    async fn resolve_path(&self, path: &str) -> Result<PathBuf, HostError> {
        Ok(self.resolve(path))
    }

    async fn cwd(&self) -> Result<PathBuf, HostError> {
        Ok(self.current_dir())
    }

    async fn set_cwd(&self, path: &str) -> Result<(), HostError> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| not_found_or_io(&full, e))?;
        if !meta.is_dir() {
            return Err(HostError::io(full.display(), "not a directory"));
        }
        *self.cwd.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = full;
        Ok(())
    }

    async fn env_var(&self, name: &str) -> Result<Option<String>, HostError> {
        Ok(std::env::var(name).ok())
    }

    async fn glob(&self, pattern: &str) -> Result<Vec<String>, HostError> {
        let cwd = self.current_dir();
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            cwd.join(pattern).to_string_lossy().into_owned()
        };

        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<String>, HostError> {
            let paths = glob::glob(&full_pattern)
                .map_err(|e| HostError::io(&full_pattern, e))?;
            let mut out: Vec<String> = paths
                .filter_map(Result::ok)
                .map(|p| {
                    p.strip_prefix(&cwd)
                        .map(|rel| rel.to_path_buf())
                        .unwrap_or(p)
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            out.sort();
            Ok(out)
        })
        .await
        .map_err(|e| HostError::io(pattern, e))??;

        Ok(matches)
    }

    async fn exec(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, HostError> {
        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(self.current_dir()).kill_on_drop(true);

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    HostError::io(command, format!("timed out after {}s", limit.as_secs()))
                })?,
            None => cmd.output().await,
        }
        .map_err(|e| HostError::io(command, e))?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(command = %command, exit_code, "Command failed");
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }

    async fn write_terminal(&self, text: &str) -> Result<(), HostError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|e| HostError::io("stdout", e))?;
        stdout.flush().await.map_err(|e| HostError::io("stdout", e))
    }

    async fn read_line(&self, prompt: &str) -> Result<String, HostError> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| HostError::io("stderr", e))?;
        stderr.flush().await.map_err(|e| HostError::io("stderr", e))?;

        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) => Err(HostError::io("stdin", "end of input")),
                Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
                Err(e) => Err(HostError::io("stdin", e)),
            }
        })
        .await
        .map_err(|e| HostError::io("stdin", e))?
    }

    async fn info(&self) -> Result<HostInfo, HostError> {
        Ok(HostInfo {
            name: "local".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        })
    }
}
