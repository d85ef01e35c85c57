//! OAuth token persistence.
//!
//! The on-disk layout matches what Google's Node client writes, so a
//! `tokens.json` produced by either tool can be reused by the other.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config::Scope, error::TokenStoreError};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl Token {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expiry_date?)
    }

    pub fn set_expires_in(&mut self, now: DateTime<Utc>, expires_in_secs: i64) {
        self.expiry_date = Some((now + TimeDelta::seconds(expires_in_secs)).timestamp_millis());
    }

    /// Tokens without a recorded expiry are never considered expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }

    /// Tokens that never recorded their scope are given the benefit of the doubt.
    pub fn grants(&self, scope: Scope) -> bool {
        match &self.scope {
            Some(granted) => granted.split_whitespace().any(|s| s == scope.url()),
            None => true,
        }
    }
}

// Keeps secrets out of debug output.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<Token>, TokenStoreError>;
    async fn save(&self, token: &Token) -> Result<(), TokenStoreError>;
}

/// Token cache kept as pretty-printed JSON in a single file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> FileTokenStore {
        FileTokenStore { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Token>, TokenStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no token file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| TokenStoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    async fn save(&self, token: &Token) -> Result<(), TokenStoreError> {
        let json = serde_json::to_vec_pretty(token).map_err(|source| TokenStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[cfg(test)]
pub use memory::MemoryTokenStore;
