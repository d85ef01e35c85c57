use chrono::Utc;
use log::{error, info, warn};
use reqwest::{Client, Url};

use crate::{
    callback_server::CallbackListener,
    config::{AuthConfig, generate_state},
    error::AuthError,
    oauth::TokenEndpoint,
    token_store::{Token, TokenStore},
};

/// Hands the consent URL to the user.
pub trait AuthorizationPrompt {
    fn present(&self, url: &Url);
}

/// Opens the consent URL in the default browser, falling back to asking
/// the user to open it themselves.
pub struct BrowserPrompt;

impl AuthorizationPrompt for BrowserPrompt {
    fn present(&self, url: &Url) {
        info!("Authorize this app by visiting this URL: {url}");
        if let Err(e) = open::that(url.as_str()) {
            warn!("Failed to open browser automatically: {e}");
        }
    }
}

pub struct Authenticator<S, P> {
    config: AuthConfig,
    store: S,
    prompt: P,
    client: Client,
}

impl<S: TokenStore, P: AuthorizationPrompt> Authenticator<S, P> {
    pub fn new(config: AuthConfig, store: S, prompt: P) -> Authenticator<S, P> {
        Authenticator {
            config,
            store,
            prompt,
            client: Client::new(),
        }
    }

    /// Returns the cached token when there is one, without checking its
    /// expiry. Otherwise runs the consent flow once and caches the result.
    pub async fn ensure_authenticated(&self) -> Result<Token, AuthError> {
        if let Some(token) = self.store.load().await? {
            info!("Loaded existing tokens.");
            if !token.grants(self.config.scope) {
                warn!(
                    "Cached token was not granted {scope}; delete the token file if requests are refused.",
                    scope = self.config.scope.url()
                );
            }
            return Ok(token);
        }

        self.authorize_interactively().await
    }

    async fn authorize_interactively(&self) -> Result<Token, AuthError> {
        let listener = CallbackListener::bind(self.config.callback_port).await?;
        let redirect_uri = AuthConfig::redirect_uri(listener.port());
        let state = generate_state();
        let url = self.config.authorization_url(&redirect_uri, &state)?;

        info!("Waiting for the authorization redirect on {redirect_uri}");
        self.prompt.present(&url);

        let pending = listener.accept_callback("/", &state).await?;
        let exchanged = TokenEndpoint::new(&self.config, &self.client)
            .exchange_code(pending.code(), &redirect_uri)
            .await;

        let token = match exchanged {
            Ok(token) => token,
            Err(e) => {
                error!("Error retrieving access token: {e}");
                pending.finish(false).await;
                return Err(AuthError::Exchange(e));
            }
        };

        if let Err(e) = self.store.save(&token).await {
            pending.finish(false).await;
            return Err(e.into());
        }
        info!("Tokens received and saved.");
        pending.finish(true).await;

        Ok(token)
    }

    /// Swaps an expired access token for a fresh one when a refresh token is
    /// available. The refreshed token is not written back to the store.
    pub async fn usable_token(&self, token: Token) -> Result<Token, AuthError> {
        if !token.is_expired(Utc::now()) {
            return Ok(token);
        }
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            warn!("Access token has expired and there is no refresh token to renew it.");
            return Ok(token);
        };

        TokenEndpoint::new(&self.config, &self.client)
            .refresh(&token, refresh_token)
            .await
            .map_err(AuthError::Exchange)
    }
}
