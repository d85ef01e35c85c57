use std::{io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to a Google API or writing what it returned.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("access token is not a valid header value")]
    InvalidAccessToken,

    #[error("refusing to write unsafe file name {0:?}")]
    UnsafeFileName(String),

    #[error("item has no {0}")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("could not access token file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("token file {path} is not valid JSON (delete it to sign in again): {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not start the callback listener on port {port}: {source}")]
    Listener { port: u16, source: io::Error },

    #[error("invalid authorization endpoint {0}")]
    InvalidEndpoint(String),

    #[error("callback connection failed: {0}")]
    Callback(io::Error),

    #[error(transparent)]
    Storage(#[from] TokenStoreError),

    #[error("authorization was denied: {0}")]
    Denied(String),

    #[error("authorization code not found in the callback request")]
    MissingCode,

    #[error("error retrieving access token: {0}")]
    Exchange(RemoteError),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("could not create output directory {path}: {source}")]
    OutputDirectory { path: PathBuf, source: io::Error },

    #[error("error fetching items: {0}")]
    Fetch(#[from] RemoteError),
}
