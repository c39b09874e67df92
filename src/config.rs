//! Client configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

fn default_events_path() -> String {
    "/events".into()
}

fn default_rpc_path() -> String {
    "/rpc".into()
}

fn default_true() -> bool {
    true
}

/// Directory (relative to the workspace root) holding local client state.
pub const STATE_DIR: &str = ".acp-conductor";

/// Client configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Base URL of the agent server, e.g. `http://127.0.0.1:8765`.
    pub server_url: String,
    /// Path of the server-push event stream.
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Path accepting client-push JSON-RPC bodies.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    /// Model identifier advertised during the handshake.
    pub model: String,
    /// Workspace the agent operates in; all tool paths resolve against it.
    pub workspace_root: PathBuf,
    /// Persist the session after every state-changing event.
    #[serde(default = "default_true")]
    pub auto_persist: bool,
    /// Session database location; defaults under the workspace.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Audit log directory; defaults under the workspace.
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the workspace root, re-running path normalisation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory does not exist.
    pub fn set_workspace_root(&mut self, root: PathBuf) -> Result<()> {
        self.workspace_root = root;
        self.validate()
    }

    /// Full URL of the server-push event stream.
    #[must_use]
    pub fn events_url(&self) -> String {
        join_url(&self.server_url, &self.events_path)
    }

    /// Full URL accepting outbound JSON-RPC bodies.
    #[must_use]
    pub fn rpc_url(&self) -> String {
        join_url(&self.server_url, &self.rpc_path)
    }

    /// Resolved session database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.workspace_root.join(STATE_DIR).join("sessions.db"))
    }

    /// Resolved audit log directory.
    #[must_use]
    pub fn audit_dir(&self) -> PathBuf {
        self.audit_dir
            .clone()
            .unwrap_or_else(|| self.workspace_root.join(STATE_DIR).join("logs"))
    }

    fn validate(&mut self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AppError::Config("model must not be empty".into()));
        }

        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "server_url must be an http(s) URL, got '{}'",
                self.server_url
            )));
        }

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
