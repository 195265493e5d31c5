//! Cursor-based paginated reads.
//!
//! A reader issues one fetch at a time, each strictly after the last item of
//! the previous page, and stops for good at the first empty page. It is
//! single-use: build a fresh reader to scan again from the start.

use futures::stream::{self, Stream, TryStreamExt};

use crate::control::Control;
use crate::error::PipelineError;
use crate::retry::Classifier;
use crate::store::{Page, QueryStore};

pub struct PaginatedReader<'s, S: QueryStore + ?Sized> {
    store: &'s S,
    page_size: usize,
    cursor: Option<S::Cursor>,
    exhausted: bool,
    fetches: u64,
    control: Control,
    classifier: Classifier,
}

impl<'s, S: QueryStore + ?Sized> PaginatedReader<'s, S> {
    pub fn new(store: &'s S, page_size: usize, control: Control) -> Result<Self, PipelineError> {
        if page_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            page_size,
            cursor: None,
            exhausted: false,
            fetches: 0,
            control,
            classifier: Classifier::default(),
        })
    }

    /// Classifier used to label a failed fetch.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Cursor after the last yielded page; `None` before the first page.
    pub fn cursor(&self) -> Option<&S::Cursor> {
        self.cursor.as_ref()
    }

    /// Number of completed fetches, including the final empty one.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetch the next page. `Ok(None)` once the store returns an empty page;
    /// every call after that (or after an error) returns `Ok(None)` without
    /// touching the store.
    pub async fn next_page(&mut self) -> Result<Option<Page<S::Item>>, PipelineError> {
        if self.exhausted {
            return Ok(None);
        }
        let fetched = self
            .control
            .call(self.store.query(self.cursor.as_ref(), self.page_size))
            .await;

        let page = match fetched {
            Ok(Ok(page)) => {
                self.fetches += 1;
                page
            }
            Ok(Err(source)) => {
                self.fetches += 1;
                self.exhausted = true;
                let classification = self.classifier.classify_total(&source);
                tracing::warn!(fetches = self.fetches, %classification, error = %source, "page fetch failed");
                return Err(PipelineError::Store {
                    classification,
                    source,
                });
            }
            Err(cancelled) => {
                self.exhausted = true;
                return Err(cancelled.into());
            }
        };

        let Some(last) = page.last() else {
            self.exhausted = true;
            tracing::debug!(fetches = self.fetches, "empty page, scan complete");
            return Ok(None);
        };
        self.cursor = Some(S::cursor_of(last));
        tracing::debug!(fetches = self.fetches, items = page.len(), "fetched page");
        Ok(Some(page))
    }

    /// Consume the reader as a lazy stream of pages.
    pub fn into_pages(self) -> impl Stream<Item = Result<Page<S::Item>, PipelineError>> + 's
    where
        S::Item: 's,
        S::Cursor: 's,
    {
        stream::try_unfold(self, |mut reader| async move {
            let page = reader.next_page().await?;
            Ok::<_, PipelineError>(page.map(|page| (page, reader)))
        })
    }

    /// Consume the reader as a lazy stream of items, in page order and
    /// within-page order.
    pub fn into_items(self) -> impl Stream<Item = Result<S::Item, PipelineError>> + 's
    where
        S::Item: 's,
        S::Cursor: 's,
    {
        self.into_pages()
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, PipelineError>)))
            .try_flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Classification;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Numbers `0..len`, cursor is the number itself.
    struct Numbers {
        len: u32,
        calls: Mutex<Vec<Option<u32>>>,
        fail_after: Option<u32>,
    }

    impl Numbers {
        fn new(len: u32) -> Self {
            Self {
                len,
                calls: Mutex::new(Vec::new()),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl QueryStore for Numbers {
        type Item = u32;
        type Cursor = u32;

        fn cursor_of(item: &u32) -> u32 {
            *item
        }

        async fn query(&self, after: Option<&u32>, limit: usize) -> Result<Page<u32>, StoreError> {
            self.calls.lock().unwrap().push(after.copied());
            let start = after.map_or(0, |c| c + 1);
            if let Some(n) = self.fail_after {
                if start >= n {
                    return Err(StoreError::remote("permission denied"));
                }
            }
            let end = (start as usize + limit).min(self.len as usize) as u32;
            Ok(Page::new((start..end).collect()))
        }
    }

    #[tokio::test]
    async fn pages_of_2500_by_1000() {
        let store = Numbers::new(2500);
        let mut reader = PaginatedReader::new(&store, 1000, Control::new()).unwrap();
        let mut sizes = Vec::new();
        while let Some(page) = reader.next_page().await.unwrap() {
            sizes.push(page.len());
            assert_eq!(reader.cursor(), page.last());
        }
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(reader.fetches(), 4);
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec![None, Some(999), Some(1999), Some(2499)]
        );
    }

    #[tokio::test]
    async fn exhausted_reader_never_fetches_again() {
        let store = Numbers::new(3);
        let mut reader = PaginatedReader::new(&store, 10, Control::new()).unwrap();
        assert_eq!(reader.next_page().await.unwrap().map(|p| p.len()), Some(3));
        assert!(reader.next_page().await.unwrap().is_none());
        assert!(reader.next_page().await.unwrap().is_none());
        assert!(reader.is_exhausted());
        assert_eq!(store.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_last_page_still_needs_empty_fetch() {
        let store = Numbers::new(2000);
        let reader = PaginatedReader::new(&store, 1000, Control::new()).unwrap();
        let pages: Vec<_> = reader.into_pages().try_collect().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn items_keep_store_order() {
        let store = Numbers::new(25);
        let reader = PaginatedReader::new(&store, 7, Control::new()).unwrap();
        let items: Vec<u32> = reader.into_items().try_collect().await.unwrap();
        assert_eq!(items, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_classification_and_ends_scan() {
        let mut store = Numbers::new(100);
        store.fail_after = Some(10);
        let mut reader = PaginatedReader::new(&store, 10, Control::new()).unwrap();
        assert!(reader.next_page().await.unwrap().is_some());
        let err = reader.next_page().await.unwrap_err();
        assert_eq!(err.classification(), Some(Classification::ClientPersistent));
        assert!(reader.next_page().await.unwrap().is_none());
        assert_eq!(store.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_reader_issues_no_fetch() {
        let store = Numbers::new(10);
        let control = Control::new();
        control.cancel();
        let mut reader = PaginatedReader::new(&store, 5, control).unwrap();
        assert!(reader.next_page().await.unwrap_err().is_cancelled());
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_page_size_rejected() {
        let store = Numbers::new(1);
        assert!(PaginatedReader::new(&store, 0, Control::new()).is_err());
    }

    /// Every fetch stalls for an hour.
    #[derive(Default)]
    struct Stalled {
        calls: std::sync::atomic::AtomicU32,
    }

    impl Stalled {
        fn calls(&self) -> u32 {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryStore for Stalled {
        type Item = u32;
        type Cursor = u32;

        fn cursor_of(item: &u32) -> u32 {
            *item
        }

        async fn query(&self, _: Option<&u32>, _: usize) -> Result<Page<u32>, StoreError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Page::new(vec![0]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_fetch_abandons_the_call() {
        let store = Stalled::default();
        let control = Control::new();
        let canceller = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let mut reader = PaginatedReader::new(&store, 10, control).unwrap();
        assert!(reader.next_page().await.unwrap_err().is_cancelled());
        assert_eq!(store.calls(), 1);
        assert_eq!(reader.fetches(), 0);
        assert!(reader.next_page().await.unwrap().is_none());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_timeout_is_a_transient_store_failure() {
        let store = Stalled::default();
        let control = Control::new().with_call_timeout(Some(std::time::Duration::from_secs(2)));
        let mut reader = PaginatedReader::new(&store, 10, control).unwrap();

        let err = reader.next_page().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Store {
                classification: Classification::Transient,
                ..
            }
        ));
        assert!(reader.is_exhausted());
        assert_eq!(store.calls(), 1);
    }
}
