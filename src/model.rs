pub use chrono::{DateTime, NaiveDate, Utc};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::{error::RemoteError, processor::RemoteItem};

/// Inclusive calendar range handed to the Photos search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange { start, end }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct GoogleDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for GoogleDate {
    fn from(date: NaiveDate) -> Self {
        GoogleDate {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub filters: SearchFilters,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<&'a str>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub date_filter: DateFilter,
}

#[derive(Serialize, Debug)]
pub struct DateFilter {
    pub ranges: Vec<GoogleDateRange>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoogleDateRange {
    pub start_date: GoogleDate,
    pub end_date: GoogleDate,
}

impl<'a> SearchRequest<'a> {
    pub fn new(range: DateRange, page_size: u32, page_token: Option<&'a str>) -> Self {
        SearchRequest {
            filters: SearchFilters {
                date_filter: DateFilter {
                    ranges: vec![GoogleDateRange {
                        start_date: range.start.into(),
                        end_date: range.end.into(),
                    }],
                },
            },
            page_size,
            page_token,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub filename: String,
    pub base_url: Option<String>,
    pub mime_type: Option<String>,
    pub media_metadata: Option<MediaMetadata>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub creation_time: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.starts_with("video/"))
    }

    /// Base URL with the suffix that asks for full-resolution bytes.
    pub fn download_url(&self) -> Result<String, RemoteError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(RemoteError::MissingField("baseUrl"))?;
        let suffix = if self.is_video() { "dv" } else { "d" };
        Ok(format!("{base_url}={suffix}"))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.media_metadata.as_ref()?.creation_time
    }
}

impl RemoteItem for MediaItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_name(&self) -> &str {
        &self.filename
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub mime_type: Option<String>,
}

impl RemoteItem for DriveFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_name(&self) -> &str {
        &self.name
    }
}

/// One page of a listing plus the cursor for the next one.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Page<T> {
        // the APIs occasionally send "" on the last page
        let next_page_token = next_page_token.filter(|token| !token.is_empty());
        Page {
            items,
            next_page_token,
        }
    }
}

impl From<SearchResponse> for Page<MediaItem> {
    fn from(response: SearchResponse) -> Self {
        Page::new(response.media_items, response.next_page_token)
    }
}

impl From<FileList> for Page<DriveFile> {
    fn from(list: FileList) -> Self {
        Page::new(list.files, list.next_page_token)
    }
}
