use std::path::Path;

use log::debug;
use reqwest::{Client, Response, header};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::error::RemoteError;

const USER_AGENT: &str = concat!("photo_sweeper/", env!("CARGO_PKG_VERSION"));

/// Builds a client that sends `Bearer <access_token>` with every request.
pub fn build_client(access_token: &str) -> Result<Client, RemoteError> {
    let mut bearer = header::HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|_| RemoteError::InvalidAccessToken)?;
    bearer.set_sensitive(true);

    let mut headers = header::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(USER_AGENT),
    );

    Ok(Client::builder().default_headers(headers).build()?)
}

/// Client for pre-signed content URLs that must not carry credentials.
pub fn build_content_client() -> Result<Client, RemoteError> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// Turns a non-2xx response into [`RemoteError::Status`], keeping the body
/// so the remote error payload ends up in the log.
pub async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status { status, body })
}

/// Streams a response body into `destination`, removing the partial file if
/// the transfer breaks off.
pub async fn save_response(response: Response, destination: &Path) -> Result<u64, RemoteError> {
    let response = ensure_success(response).await?;
    let mut file = File::create(destination).await?;

    match write_body(response, &mut file).await {
        Ok(written) => {
            debug!("wrote {written} bytes to {}", destination.display());
            Ok(written)
        }
        Err(e) => {
            drop(file);
            let _ = tokio::fs::remove_file(destination).await;
            Err(e)
        }
    }
}

async fn write_body(mut response: Response, file: &mut File) -> Result<u64, RemoteError> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
