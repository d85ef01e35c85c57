use std::path::Path;

use async_trait::async_trait;
use filetime::FileTime;
use log::warn;
use reqwest::Client;

use crate::{
    error::RemoteError,
    model::{DateRange, MediaItem, Page, SearchRequest, SearchResponse},
    processor::{MediaLibrary, PAGE_SIZE},
    transfer,
};

const PHOTOS_API: &str = "https://photoslibrary.googleapis.com/v1";

/// Google Photos Library API, restricted to one date range.
pub struct PhotosClient {
    api_base: String,
    date_range: DateRange,
    client: Client,
    content_client: Client,
}

impl PhotosClient {
    pub fn new(access_token: &str, date_range: DateRange) -> Result<PhotosClient, RemoteError> {
        Self::with_api_base(PHOTOS_API, access_token, date_range)
    }

    pub fn with_api_base(
        api_base: &str,
        access_token: &str,
        date_range: DateRange,
    ) -> Result<PhotosClient, RemoteError> {
        Ok(PhotosClient {
            api_base: api_base.trim_end_matches('/').to_string(),
            date_range,
            client: transfer::build_client(access_token)?,
            content_client: transfer::build_content_client()?,
        })
    }
}

#[async_trait]
impl MediaLibrary for PhotosClient {
    type Item = MediaItem;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<MediaItem>, RemoteError> {
        let request = SearchRequest::new(self.date_range, PAGE_SIZE, cursor);
        let response = self
            .client
            .post(format!("{api_base}/mediaItems:search", api_base = self.api_base))
            .json(&request)
            .send()
            .await?;
        let body = transfer::ensure_success(response).await?.text().await?;

        Ok(serde_json::from_str::<SearchResponse>(&body)?.into())
    }

    async fn download(&self, item: &MediaItem, destination: &Path) -> Result<(), RemoteError> {
        let response = self.content_client.get(item.download_url()?).send().await?;
        transfer::save_response(response, destination).await?;

        if let Some(created_at) = item.created_at() {
            let mtime = FileTime::from_unix_time(created_at.timestamp(), 0);
            if let Err(e) = filetime::set_file_mtime(destination, mtime) {
                warn!(
                    "Could not set modification time on {path}: {e}",
                    path = destination.display()
                );
            }
        }

        Ok(())
    }

    async fn delete(&self, item: &MediaItem) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(format!(
                "{api_base}/mediaItems/{id}",
                api_base = self.api_base,
                id = item.id
            ))
            .send()
            .await?;
        transfer::ensure_success(response).await?;
        Ok(())
    }
}
