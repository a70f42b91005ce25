//! CLI Utilities
//!
//! Shared setup for commands: configuration resolution and store access.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, ConfigLoader};
use crate::context::ContextEngine;
use crate::storage::{Database, SharedDocumentStore, SqliteDocumentStore};
use crate::types::{Result, WeaveError};

/// Resolved configuration plus the project root it was loaded for
pub struct CommandContext {
    pub root: PathBuf,
    pub config: Config,
}

impl CommandContext {
    /// Load layered configuration for `root`, or read `config_file` alone when given
    pub fn load(root: impl Into<PathBuf>, config_file: Option<&Path>) -> Result<Self> {
        let root = root.into();
        let config = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(WeaveError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                ConfigLoader::load_from_file(path)?
            }
            None => ConfigLoader::load_in(&root)?,
        };
        Ok(Self { root, config })
    }

    /// Database path, resolved against the project root when relative
    pub fn database_path(&self) -> PathBuf {
        let path = &self.config.storage.database_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(path)
        }
    }

    /// Open (creating when missing) the document database
    pub fn open_store(&self) -> Result<SqliteDocumentStore> {
        let path = self.database_path();
        debug!("Opening document database: {}", path.display());
        let db = Database::open(&path)?;
        Ok(SqliteDocumentStore::new(Arc::new(db)))
    }

    /// Open the document database, failing when it has not been created yet
    pub fn require_store(&self) -> Result<SqliteDocumentStore> {
        let path = self.database_path();
        if !path.exists() {
            return Err(WeaveError::Storage(format!(
                "No document database at {}. Run 'contextweave import' first.",
                path.display()
            )));
        }
        self.open_store()
    }

    /// Engine wired with the configured registry, estimators and settings
    pub fn engine(&self, store: SharedDocumentStore) -> Result<ContextEngine> {
        Ok(ContextEngine::new(store, self.config.shared_registry()?)
            .with_estimators(self.config.estimators())
            .with_settings(self.config.engine_settings()))
    }
}

/// Cancellation token tripped by Ctrl-C
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
