mod authenticator;
mod callback_server;
mod config;
mod drive_client;
mod error;
mod model;
mod oauth;
mod photos_client;
mod processor;
mod reporter;
#[cfg(test)]
mod test_support;
mod token_store;
mod transfer;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use git_version::git_version;
use log::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    authenticator::{Authenticator, BrowserPrompt},
    config::{AuthConfig, ClientSecret, DEFAULT_CALLBACK_PORT, Scope},
    drive_client::DriveClient,
    model::{DateRange, NaiveDate},
    photos_client::PhotosClient,
    processor::{Action, MediaLibrary},
    reporter::LogReporter,
    token_store::FileTokenStore,
};

pub const GIT_VERSION: &str = git_version!(args = ["--always", "--dirty=-modified"], fallback = "unknown");

/// Photo Sweeper: bulk download or delete Google Photos and Drive items
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OAuth client secret JSON from the Google Cloud console
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,

    /// Where the OAuth token is cached between runs
    #[arg(long, default_value = "tokens.json")]
    token_file: PathBuf,

    /// Local port that receives the OAuth redirect
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download photos taken within a date range
    Download {
        #[arg(long, default_value = "2023-01-01")]
        start_date: NaiveDate,

        #[arg(long, default_value = "2023-12-31")]
        end_date: NaiveDate,

        #[arg(short, long, default_value = "downloads")]
        output_directory: PathBuf,
    },

    /// Delete photos taken within a date range
    Delete {
        #[arg(long)]
        start_date: NaiveDate,

        #[arg(long)]
        end_date: NaiveDate,
    },

    /// Download Drive files matching a search query
    DownloadDrive {
        #[arg(long, default_value = drive_client::DEFAULT_QUERY)]
        query: String,

        #[arg(short, long, default_value = "downloads")]
        output_directory: PathBuf,
    },

    /// Delete Drive files matching a search query
    DeleteDrive {
        #[arg(long)]
        query: String,
    },
}

impl Command {
    fn scope(&self) -> Scope {
        match self {
            Command::Download { .. } => Scope::PhotosReadOnly,
            Command::Delete { .. } => Scope::Photos,
            Command::DownloadDrive { .. } => Scope::DriveReadOnly,
            Command::DeleteDrive { .. } => Scope::Drive,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("Photo Sweeper");
    println!("{GIT_VERSION}");

    let secret = ClientSecret::from_file(&args.credentials)?;
    let config = AuthConfig::new(secret, args.command.scope(), args.port);
    let authenticator = Authenticator::new(config, FileTokenStore::new(&args.token_file), BrowserPrompt);

    let token = authenticator
        .ensure_authenticated()
        .await
        .context("authentication failed")?;
    let token = authenticator.usable_token(token).await?;
    let access_token = token.access_token.as_str();

    match args.command {
        Command::Download {
            start_date,
            end_date,
            output_directory,
        } => {
            let library = PhotosClient::new(access_token, DateRange::new(start_date, end_date))?;
            run(&library, Action::Download { output_directory }, "photos").await
        }
        Command::Delete {
            start_date,
            end_date,
        } => {
            let library = PhotosClient::new(access_token, DateRange::new(start_date, end_date))?;
            run(&library, Action::Delete, "photos").await
        }
        Command::DownloadDrive {
            query,
            output_directory,
        } => {
            let library = DriveClient::new(access_token, &query)?;
            run(&library, Action::Download { output_directory }, "files").await
        }
        Command::DeleteDrive { query } => {
            let library = DriveClient::new(access_token, &query)?;
            run(&library, Action::Delete, "files").await
        }
    }
}

async fn run<L: MediaLibrary>(library: &L, action: Action, noun: &'static str) -> anyhow::Result<()> {
    if let Action::Download { output_directory } = &action {
        info!("Saving {noun} to {dir}...", dir = output_directory.display());
    }

    let reporter = LogReporter::new(noun);
    if let Err(e) = processor::process_all(library, &action, &reporter).await {
        error!(
            "Error fetching or {verb} {noun}: {e}",
            verb = action.present_participle().to_lowercase()
        );
        return Err(e.into());
    }
    Ok(())
}
