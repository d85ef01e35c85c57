//! Walks a cursor-paginated remote collection and applies one action to
//! every item, strictly in the order the server returns them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    error::{ProcessError, RemoteError},
    model::Page,
    reporter::{Reporter, RunEvent},
};

pub const PAGE_SIZE: u32 = 50;

pub trait RemoteItem {
    fn id(&self) -> &str;
    fn file_name(&self) -> &str;
}

/// A remote collection that can be listed page by page, downloaded from and
/// deleted from.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    type Item: RemoteItem + Send + Sync;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<Self::Item>, RemoteError>;

    /// Streams the item's content into `destination`, returning once the
    /// file is fully written.
    async fn download(&self, item: &Self::Item, destination: &Path) -> Result<(), RemoteError>;

    async fn delete(&self, item: &Self::Item) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Download { output_directory: PathBuf },
    Delete,
}

impl Action {
    pub fn past_tense(&self) -> &'static str {
        match self {
            Action::Download { .. } => "Downloaded",
            Action::Delete => "Deleted",
        }
    }

    pub fn present_participle(&self) -> &'static str {
        match self {
            Action::Download { .. } => "Downloading",
            Action::Delete => "Deleting",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTally {
    processed: u64,
}

impl RunTally {
    pub fn processed(&self) -> u64 {
        self.processed
    }

    fn record_success(&mut self) {
        self.processed += 1;
    }
}

pub async fn process_all<L>(
    library: &L,
    action: &Action,
    reporter: &dyn Reporter,
) -> Result<RunTally, ProcessError>
where
    L: MediaLibrary + ?Sized,
{
    if let Action::Download { output_directory } = action {
        tokio::fs::create_dir_all(output_directory)
            .await
            .map_err(|source| ProcessError::OutputDirectory {
                path: output_directory.clone(),
                source,
            })?;
    }

    let mut tally = RunTally::default();
    let mut cursor: Option<String> = None;
    loop {
        let page = library.fetch_page(cursor.as_deref()).await?;
        if page.items.is_empty() {
            reporter.report(action, RunEvent::NoMoreItems);
            break;
        }

        reporter.report(
            action,
            RunEvent::PageFetched {
                item_count: page.items.len(),
            },
        );

        for item in &page.items {
            match apply(library, action, item).await {
                Ok(()) => {
                    tally.record_success();
                    reporter.report(
                        action,
                        RunEvent::ItemProcessed {
                            id: item.id().to_string(),
                            file_name: item.file_name().to_string(),
                        },
                    );
                }
                Err(e) => reporter.report(
                    action,
                    RunEvent::ItemFailed {
                        id: item.id().to_string(),
                        file_name: item.file_name().to_string(),
                        error: e.to_string(),
                    },
                ),
            }
        }

        match page.next_page_token {
            Some(token) => cursor = Some(token),
            None => break,
        }
    }

    reporter.report(
        action,
        RunEvent::Finished {
            total: tally.processed(),
        },
    );
    Ok(tally)
}

async fn apply<L>(library: &L, action: &Action, item: &L::Item) -> Result<(), RemoteError>
where
    L: MediaLibrary + ?Sized,
{
    if item.id().is_empty() {
        return Err(RemoteError::MissingField("id"));
    }
    match action {
        Action::Download { output_directory } => {
            let destination = destination_path(output_directory, item.file_name())?;
            library.download(item, &destination).await
        }
        Action::Delete => library.delete(item).await,
    }
}

/// Joins a remote file name onto the output directory. Names that would
/// escape the directory are rejected; existing files are overwritten.
pub fn destination_path(output_directory: &Path, file_name: &str) -> Result<PathBuf, RemoteError> {
    if file_name.is_empty() {
        return Err(RemoteError::MissingField("file name"));
    }
    let is_plain = file_name != "."
        && file_name != ".."
        && !file_name.contains(['/', '\\']);
    if !is_plain {
        return Err(RemoteError::UnsafeFileName(file_name.to_string()));
    }
    Ok(output_directory.join(file_name))
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashSet, VecDeque},
        sync::Mutex,
    };

    use reqwest::StatusCode;

    use super::*;

    #[derive(Debug, Clone)]
    struct FakeItem {
        id: String,
        name: String,
    }

    impl RemoteItem for FakeItem {
        fn id(&self) -> &str {
            &self.id
        }

        fn file_name(&self) -> &str {
            &self.name
        }
    }

    fn items(prefix: &str, count: usize) -> Vec<FakeItem> {
        (1..=count)
            .map(|n| FakeItem {
                id: format!("{prefix}-{n}"),
                name: format!("{prefix}-{n}.jpg"),
            })
            .collect()
    }

    #[derive(Default)]
    struct FakeLibrary {
        pages: Mutex<VecDeque<Page<FakeItem>>>,
        cursors: Mutex<Vec<Option<String>>>,
        attempts: Mutex<Vec<String>>,
        downloads: Mutex<Vec<PathBuf>>,
        failing: HashSet<String>,
    }

    impl FakeLibrary {
        fn new(pages: Vec<Page<FakeItem>>) -> FakeLibrary {
            FakeLibrary {
                pages: Mutex::new(pages.into()),
                ..Default::default()
            }
        }

        fn failing(mut self, id: &str) -> FakeLibrary {
            self.failing.insert(id.to_string());
            self
        }

        fn fetch_count(&self) -> usize {
            self.cursors.lock().unwrap().len()
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }

        fn attempt(&self, item: &FakeItem) -> Result<(), RemoteError> {
            self.attempts.lock().unwrap().push(item.id.clone());
            if self.failing.contains(&item.id) {
                return Err(RemoteError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: "gone".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MediaLibrary for FakeLibrary {
        type Item = FakeItem;

        async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<FakeItem>, RemoteError> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Page::new(Vec::new(), None)))
        }

        async fn download(&self, item: &FakeItem, destination: &Path) -> Result<(), RemoteError> {
            self.downloads.lock().unwrap().push(destination.to_path_buf());
            self.attempt(item)
        }

        async fn delete(&self, item: &FakeItem) -> Result<(), RemoteError> {
            self.attempt(item)
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<RunEvent>>,
    }

    impl Reporter for RecordingReporter {
        fn report(&self, _action: &Action, event: RunEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingReporter {
        fn events(&self) -> Vec<RunEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn follows_cursor_until_it_is_absent() {
        let library = FakeLibrary::new(vec![
            Page::new(items("a", 50), Some("A".to_string())),
            Page::new(items("b", 3), None),
            Page::new(items("never", 7), None),
        ]);
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(2, library.fetch_count());
        assert_eq!(
            vec![None, Some("A".to_string())],
            *library.cursors.lock().unwrap()
        );
        assert_eq!(53, library.attempts().len());
        assert_eq!(53, tally.processed());
        assert_eq!(
            Some(&RunEvent::Finished { total: 53 }),
            reporter.events().last()
        );
    }

    #[tokio::test]
    async fn empty_page_stops_the_run() {
        let library = FakeLibrary::new(vec![
            Page::new(Vec::new(), Some("ignored".to_string())),
            Page::new(items("never", 2), None),
        ]);
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(1, library.fetch_count());
        assert!(library.attempts().is_empty());
        assert_eq!(0, tally.processed());
        assert_eq!(
            vec![RunEvent::NoMoreItems, RunEvent::Finished { total: 0 }],
            reporter.events()
        );
    }

    #[tokio::test]
    async fn empty_page_after_cursor_ends_the_run() {
        let library = FakeLibrary::new(vec![
            Page::new(items("a", 4), Some("A".to_string())),
            Page::new(Vec::new(), None),
        ]);
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(2, library.fetch_count());
        assert_eq!(4, tally.processed());
    }

    #[tokio::test]
    async fn failed_item_does_not_stop_the_page() {
        let library = FakeLibrary::new(vec![Page::new(items("p", 5), None)]).failing("p-2");
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(vec!["p-1", "p-2", "p-3", "p-4", "p-5"], library.attempts());
        assert_eq!(4, tally.processed());

        let failures: Vec<RunEvent> = reporter
            .events()
            .into_iter()
            .filter(|event| matches!(event, RunEvent::ItemFailed { .. }))
            .collect();
        assert_eq!(1, failures.len());
        match &failures[0] {
            RunEvent::ItemFailed {
                id,
                file_name,
                error,
            } => {
                assert_eq!("p-2", id);
                assert_eq!("p-2.jpg", file_name);
                assert!(error.contains("404"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn tally_counts_only_successes_across_pages() {
        let library = FakeLibrary::new(vec![
            Page::new(items("a", 3), Some("A".to_string())),
            Page::new(items("b", 3), Some("B".to_string())),
            Page::new(items("c", 2), None),
        ])
        .failing("a-1")
        .failing("b-3")
        .failing("c-2");
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(3, library.fetch_count());
        assert_eq!(8, library.attempts().len());
        assert_eq!(5, tally.processed());
    }

    #[tokio::test]
    async fn download_creates_directory_and_targets_file_name() {
        let temp = tempfile::tempdir().unwrap();
        let output_directory = temp.path().join("nested").join("downloads");
        let library = FakeLibrary::new(vec![Page::new(items("d", 2), None)]);
        let reporter = RecordingReporter::default();
        let action = Action::Download {
            output_directory: output_directory.clone(),
        };

        let tally = process_all(&library, &action, &reporter).await.unwrap();

        assert!(output_directory.is_dir());
        assert_eq!(2, tally.processed());
        assert_eq!(
            vec![output_directory.join("d-1.jpg"), output_directory.join("d-2.jpg")],
            *library.downloads.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn unsafe_file_name_fails_only_that_item() {
        let temp = tempfile::tempdir().unwrap();
        let mut page_items = items("s", 2);
        page_items.insert(
            1,
            FakeItem {
                id: "evil".to_string(),
                name: "../escape.jpg".to_string(),
            },
        );
        let library = FakeLibrary::new(vec![Page::new(page_items, None)]);
        let reporter = RecordingReporter::default();
        let action = Action::Download {
            output_directory: temp.path().to_path_buf(),
        };

        let tally = process_all(&library, &action, &reporter).await.unwrap();

        assert_eq!(vec!["s-1", "s-2"], library.attempts());
        assert_eq!(2, tally.processed());
        assert!(reporter.events().iter().any(|event| matches!(
            event,
            RunEvent::ItemFailed { id, .. } if id == "evil"
        )));
    }

    #[tokio::test]
    async fn item_without_id_fails_only_that_item() {
        let mut page_items = items("n", 2);
        page_items.insert(
            1,
            FakeItem {
                id: String::new(),
                name: "orphan.jpg".to_string(),
            },
        );
        let library = FakeLibrary::new(vec![Page::new(page_items, None)]);
        let reporter = RecordingReporter::default();

        let tally = process_all(&library, &Action::Delete, &reporter)
            .await
            .unwrap();

        assert_eq!(vec!["n-1", "n-2"], library.attempts());
        assert_eq!(2, tally.processed());
        assert!(reporter.events().iter().any(|event| matches!(
            event,
            RunEvent::ItemFailed { file_name, error, .. }
                if file_name == "orphan.jpg" && error.contains("no id")
        )));
    }

    #[test]
    fn destination_path_rejects_traversal() {
        let dir = Path::new("downloads");

        assert_eq!(
            dir.join("IMG_1.JPG"),
            destination_path(dir, "IMG_1.JPG").unwrap()
        );
        assert!(matches!(
            destination_path(dir, ""),
            Err(RemoteError::MissingField("file name"))
        ));
        for name in [".", "..", "a/b.jpg", "..\\c.jpg"] {
            assert!(matches!(
                destination_path(dir, name),
                Err(RemoteError::UnsafeFileName(_))
            ));
        }
    }
}
