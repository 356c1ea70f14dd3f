//! Where the bearer and refresh tokens live between invocations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

pub trait TokenStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<TokenPair>>;
    fn save(&self, tokens: &TokenPair) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Tokens kept as one JSON document, replaced atomically on every save.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub const FILE_NAME: &'static str = "tokens.json";

    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join(Self::FILE_NAME);
        info!(file = %path.display(), "opened token store");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> anyhow::Result<Option<TokenPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let tokens = serde_json::from_str(&text)
            .with_context(|| format!("malformed session file {}", self.path.display()))?;
        Ok(Some(tokens))
    }

    fn save(&self, tokens: &TokenPair) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), "saving tokens atomically");
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string(tokens)?;
        writeln!(temp, "{serialized}")?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
            info!(file = %self.path.display(), "cleared stored session");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new(tokens: Option<TokenPair>) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> anyhow::Result<Option<TokenPair>> {
        Ok(self.tokens.read().clone())
    }

    fn save(&self, tokens: &TokenPair) -> anyhow::Result<()> {
        *self.tokens.write() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.tokens.write() = None;
        Ok(())
    }
}
