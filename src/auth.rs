//! Bearer token sources
//!
//! Clients never cache a token: they ask their [`TokenProvider`] on every call,
//! so a token written to the store after construction is picked up by the next
//! request.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which the token lives in a [`FileTokenStore`]
pub const TOKEN_KEY: &str = "token";

/// Anything able to hand out the current bearer token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` if the user is not logged in
    async fn token(&self) -> Option<String>;
}

#[async_trait]
impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    async fn token(&self) -> Option<String> {
        self()
    }
}

/// `Authorization: Bearer <token>` value shared by both clients
pub fn bearer_header(token: &str) -> Result<HeaderValue> {
    let mut value =
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ClientError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Fixed token, mostly useful for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Provider that never yields a token
    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on each call
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}

/// Asks each provider in turn; the first one with a token wins
#[derive(Clone, Default)]
pub struct ChainedTokens {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }
}

#[async_trait]
impl TokenProvider for ChainedTokens {
    async fn token(&self) -> Option<String> {
        for provider in &self.providers {
            if let Some(token) = provider.token().await {
                return Some(token);
            }
        }
        None
    }
}

/// Persisted key-value store backed by a JSON object on disk
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a string value; a missing file or key yields `None`
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.load().await?;
        Ok(entries.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// Store `value` under `key`, creating the file and its directory if needed
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&entries).await
    }

    /// Remove `key`; returns whether it was present
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.load().await?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries).await?;
        }
        Ok(existed)
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("Wrote token store {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for FileTokenStore {
    async fn token(&self) -> Option<String> {
        match self.get(TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read token store {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
