use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::RemoteError,
    model::{DriveFile, FileList, Page},
    processor::{MediaLibrary, PAGE_SIZE},
    transfer,
};

const FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

pub const DEFAULT_QUERY: &str = "'root' in parents and mimeType contains 'image/'";

/// Google Drive v3 files matching a search query.
pub struct DriveClient {
    files_url: String,
    query: String,
    client: Client,
}

impl DriveClient {
    pub fn new(access_token: &str, query: &str) -> Result<DriveClient, RemoteError> {
        Self::with_files_url(FILES_API, access_token, query)
    }

    pub fn with_files_url(
        files_url: &str,
        access_token: &str,
        query: &str,
    ) -> Result<DriveClient, RemoteError> {
        Ok(DriveClient {
            files_url: files_url.trim_end_matches('/').to_string(),
            query: query.to_string(),
            client: transfer::build_client(access_token)?,
        })
    }

    fn file_url(&self, id: &str) -> String {
        format!("{files_url}/{id}", files_url = self.files_url)
    }
}

#[async_trait]
impl MediaLibrary for DriveClient {
    type Item = DriveFile;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<DriveFile>, RemoteError> {
        let page_size = PAGE_SIZE.to_string();
        let mut params = vec![
            ("q", self.query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
        ];
        if let Some(cursor) = cursor {
            params.push(("pageToken", cursor));
        }

        let response = self
            .client
            .get(&self.files_url)
            .query(&params)
            .send()
            .await?;
        let body = transfer::ensure_success(response).await?.text().await?;

        Ok(serde_json::from_str::<FileList>(&body)?.into())
    }

    async fn download(&self, item: &DriveFile, destination: &Path) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(self.file_url(&item.id))
            .query(&[("alt", "media")])
            .send()
            .await?;
        transfer::save_response(response, destination).await?;
        Ok(())
    }

    async fn delete(&self, item: &DriveFile) -> Result<(), RemoteError> {
        let response = self.client.delete(self.file_url(&item.id)).send().await?;
        transfer::ensure_success(response).await?;
        Ok(())
    }
}
