use chrono::Utc;
use log::info;
use reqwest::Client;
use serde::Deserialize;

use crate::{config::AuthConfig, error::RemoteError, token_store::Token, transfer};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Token {
        let mut token = Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: None,
        };
        if let Some(expires_in) = self.expires_in {
            token.set_expires_in(Utc::now(), expires_in);
        }
        token
    }
}

/// Calls against the provider's token endpoint.
pub struct TokenEndpoint<'a> {
    config: &'a AuthConfig,
    client: &'a Client,
}

impl<'a> TokenEndpoint<'a> {
    pub fn new(config: &'a AuthConfig, client: &'a Client) -> TokenEndpoint<'a> {
        TokenEndpoint { config, client }
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Token, RemoteError> {
        info!("Exchanging authorization code for tokens");
        self.request(&[
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Google omits the refresh token from refresh responses, so the one we
    /// already hold is carried over.
    pub async fn refresh(&self, token: &Token, refresh_token: &str) -> Result<Token, RemoteError> {
        info!("Refreshing expired access token");
        let mut refreshed = self
            .request(&[
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }
        if refreshed.scope.is_none() {
            refreshed.scope = token.scope.clone();
        }
        Ok(refreshed)
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<Token, RemoteError> {
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(form)
            .send()
            .await?;
        let body = transfer::ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str::<TokenResponse>(&body)?.into_token())
    }
}
