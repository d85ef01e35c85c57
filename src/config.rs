use std::path::Path;

use anyhow::{Context, anyhow};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::Url;
use serde::Deserialize;

use crate::error::AuthError;

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_CALLBACK_PORT: u16 = 3000;

/// Permission requested during the consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PhotosReadOnly,
    Photos,
    DriveReadOnly,
    Drive,
}

impl Scope {
    pub fn url(&self) -> &'static str {
        match self {
            Scope::PhotosReadOnly => "https://www.googleapis.com/auth/photoslibrary.readonly",
            Scope::Photos => "https://www.googleapis.com/auth/photoslibrary",
            Scope::DriveReadOnly => "https://www.googleapis.com/auth/drive.readonly",
            Scope::Drive => "https://www.googleapis.com/auth/drive",
        }
    }
}

/// Shape of the client secret JSON downloaded from the Google Cloud console.
#[derive(Deserialize, Debug)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientSecret {
    pub fn from_json(json: &str) -> anyhow::Result<ClientSecret> {
        let file: ClientSecretFile =
            serde_json::from_str(json).context("credentials are not valid client secret JSON")?;
        file.installed
            .or(file.web)
            .ok_or_else(|| anyhow!("credentials contain neither an \"installed\" nor a \"web\" client"))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<ClientSecret> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("could not read credentials file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }
}

/// Everything the authenticator needs, fixed for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scope: Scope,
    /// Port the loopback listener binds; 0 picks a free one.
    pub callback_port: u16,
    pub auth_endpoint: String,
    pub token_endpoint: String,
}

impl AuthConfig {
    pub fn new(secret: ClientSecret, scope: Scope, callback_port: u16) -> AuthConfig {
        AuthConfig {
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scope,
            callback_port,
            auth_endpoint: AUTH_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        }
    }

    pub fn redirect_uri(port: u16) -> String {
        format!("http://localhost:{port}")
    }

    /// Consent URL asking for offline access, always showing the consent
    /// screen so Google hands out a refresh token. `state` comes back on the
    /// redirect untouched.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.auth_endpoint,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", self.scope.url()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {e}", self.auth_endpoint)))
    }
}

/// Random value tying a redirect to the consent URL this run handed out.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
