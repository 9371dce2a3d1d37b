//! The document walk: convert, correct, and emit pages in order.
//!
//! ## State
//!
//! The walk holds at most one page back (the *held* page). A held page
//! is not final yet. The next successful page may show that a table on the
//! held page continues, and the overlap corrector may then rewrite both.
//!
//! ```text
//! for each page, in order:
//!     convert ──fail──▶ skip (held unchanged, no correction across the gap)
//!        │
//!        ok
//!        ├─ held empty ──▶ held = current
//!        └─ held set   ──▶ correct(held, current)
//!                          emit corrected held
//!                          held = corrected current
//! end: emit held, if any
//! ```
//!
//! Consequences: emitted pages are exactly the converted pages, in strictly
//! increasing page order; a correction always pairs two successful pages
//! that are adjacent in success order, which may straddle failed pages.
//!
//! The walk is lazy. Nothing is converted until the stream is polled, and
//! each poll drives just enough work to produce the next final page.

use super::convert::PageConverter;
use super::overlap::OverlapCorrector;
use super::render::Page;
use crate::config::WorkerConfig;
use crate::inference::InferenceClient;
use crate::output::{PageMarkdown, PipelineStats};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Drives the per-page loop over one document.
#[derive(Clone)]
pub struct DocumentPipeline {
    converter: PageConverter,
    corrector: OverlapCorrector,
    progress: ProgressCallback,
}

impl DocumentPipeline {
    /// A pipeline with the default prompts, sharing one inference client.
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self::from_parts(
            PageConverter::new(Arc::clone(&client)),
            OverlapCorrector::new(client),
        )
    }

    /// A pipeline using the prompt overrides from `config`.
    pub fn from_config(client: Arc<dyn InferenceClient>, config: &WorkerConfig) -> Self {
        let mut converter = PageConverter::new(Arc::clone(&client));
        if let Some(ref prompt) = config.page_prompt {
            converter = converter.with_prompt(prompt.as_str());
        }
        let mut corrector = OverlapCorrector::new(client);
        if let Some(ref prompt) = config.correction_prompt {
            corrector = corrector.with_prompt(prompt.as_str());
        }
        Self::from_parts(converter, corrector)
    }

    pub fn from_parts(converter: PageConverter, corrector: OverlapCorrector) -> Self {
        Self {
            converter,
            corrector,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Lazily walk `pages`, yielding each converted page once it is final.
    ///
    /// Pages must be in document order. The stream is not resumable: to
    /// walk again, call `produce` with a fresh page list.
    pub fn produce(&self, pages: Vec<Page>) -> DocumentStream<'_> {
        let stats = Arc::new(Mutex::new(PipelineStats::default()));
        let state = WalkState::new(pages, Arc::clone(&stats));

        let inner = stream::unfold(state, move |mut state| async move {
            let page = self.advance(&mut state).await?;
            Some((page, state))
        });

        DocumentStream {
            inner: Box::pin(inner.fuse()),
            stats,
        }
    }

    /// Walk `pages` to the end and return every emitted page with the stats.
    pub async fn run(&self, pages: Vec<Page>) -> (Vec<PageMarkdown>, PipelineStats) {
        let mut stream = self.produce(pages);
        let mut emitted = Vec::new();
        while let Some(page) = stream.next().await {
            emitted.push(page);
        }
        (emitted, stream.stats())
    }

    /// Advance the walk until one page becomes final, or the document ends.
    async fn advance(&self, state: &mut WalkState) -> Option<PageMarkdown> {
        let total = state.total;
        if !state.started {
            state.started = true;
            self.progress.on_document_start(total);
        }

        while let Some(page) = state.pages.next() {
            state.position += 1;
            state.record(|s| s.pages_seen += 1);
            self.progress.on_page_start(page.index, total);
            debug!(
                "Converting page {} ({}/{})",
                page.index, state.position, total
            );

            let current = match self.converter.convert(&page).await {
                Ok(markdown) => markdown,
                Err(e) => {
                    warn!("Skipping page {}: {}", page.index, e);
                    state.record(|s| s.pages_failed += 1);
                    self.progress.on_page_error(page.index, total, &e.to_string());
                    continue;
                }
            };

            state.record(|s| s.pages_converted += 1);
            self.progress
                .on_page_complete(current.page_index, total, current.content.len());

            match state.held.take() {
                None => state.held = Some(current),
                Some(held) => {
                    let result = self.corrector.correct(held, current).await;
                    let corrected = result.outcome.is_corrected();
                    state.record(|s| {
                        if corrected {
                            s.corrections_applied += 1;
                        } else {
                            s.corrections_kept += 1;
                        }
                    });
                    self.progress.on_overlap_checked(
                        result.previous.page_index,
                        result.current.page_index,
                        corrected,
                    );

                    state.held = Some(result.current);
                    return Some(result.previous);
                }
            }
        }

        if !state.finished {
            state.finished = true;
            let stats = state.snapshot();
            info!(
                "Document walk finished: {}/{} pages converted, {} corrected boundaries",
                stats.pages_converted, total, stats.corrections_applied
            );
            self.progress
                .on_document_complete(total, stats.pages_converted);
        }

        state.held.take()
    }
}

/// Explicit state of one walk.
struct WalkState {
    pages: std::vec::IntoIter<Page>,
    held: Option<PageMarkdown>,
    /// Pages consumed so far.
    position: usize,
    total: usize,
    started: bool,
    finished: bool,
    stats: Arc<Mutex<PipelineStats>>,
}

impl WalkState {
    fn new(pages: Vec<Page>, stats: Arc<Mutex<PipelineStats>>) -> Self {
        Self {
            total: pages.len(),
            pages: pages.into_iter(),
            held: None,
            position: 0,
            started: false,
            finished: false,
            stats,
        }
    }

    fn record(&self, f: impl FnOnce(&mut PipelineStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }

    fn snapshot(&self) -> PipelineStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The lazy sequence of final pages returned by [`DocumentPipeline::produce`].
pub struct DocumentStream<'a> {
    inner: Pin<Box<dyn Stream<Item = PageMarkdown> + Send + 'a>>,
    stats: Arc<Mutex<PipelineStats>>,
}

impl DocumentStream<'_> {
    /// Counters so far; complete once the stream has ended.
    pub fn stats(&self) -> PipelineStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Stream for DocumentStream<'_> {
    type Item = PageMarkdown;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::pipeline::testing::{blank_pages, fenced, ScriptedClient};

    fn unavailable() -> Result<Vec<String>, InferenceError> {
        Err(InferenceError::Unavailable {
            endpoint: "test".into(),
            detail: "down".into(),
        })
    }

    #[tokio::test]
    async fn single_page_is_emitted_without_correction() {
        let client = ScriptedClient::new(vec![fenced(&["p0"])]);
        let pipeline = DocumentPipeline::new(client.clone());

        let (pages, stats) = pipeline.run(blank_pages(1)).await;

        assert_eq!(pages, vec![PageMarkdown::new(0, "p0")]);
        assert_eq!(client.requests().len(), 1);
        assert_eq!(stats.corrections_applied + stats.corrections_kept, 0);
    }

    #[tokio::test]
    async fn correction_rewrites_held_and_current() {
        let client = ScriptedClient::new(vec![
            fenced(&["| a |\n|---|\n| 1 |"]),
            fenced(&["| 2 |\n\ntext"]),
            fenced(&["| a |\n|---|\n| 1 |\n| 2 |", "text"]),
        ]);
        let pipeline = DocumentPipeline::new(client);

        let (pages, stats) = pipeline.run(blank_pages(2)).await;

        assert_eq!(
            pages,
            vec![
                PageMarkdown::new(0, "| a |\n|---|\n| 1 |\n| 2 |"),
                PageMarkdown::new(1, "text"),
            ]
        );
        assert_eq!(stats.corrections_applied, 1);
    }

    #[tokio::test]
    async fn emits_lazily_one_page_behind() {
        let client = ScriptedClient::new(vec![
            fenced(&["p0"]),
            fenced(&["p1"]),
            Ok(vec!["no change".to_string()]),
            fenced(&["p2"]),
            Ok(vec!["no change".to_string()]),
        ]);
        let pipeline = DocumentPipeline::new(client.clone());
        let mut stream = pipeline.produce(blank_pages(3));

        assert!(client.requests().is_empty(), "nothing runs before polling");

        // Page 0 becomes final only after page 1 converted and was compared.
        assert_eq!(stream.next().await, Some(PageMarkdown::new(0, "p0")));
        assert_eq!(client.requests().len(), 3);

        assert_eq!(stream.next().await, Some(PageMarkdown::new(1, "p1")));
        assert_eq!(stream.next().await, Some(PageMarkdown::new(2, "p2")));
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);

        let stats = stream.stats();
        assert_eq!(stats.pages_converted, 3);
        assert_eq!(stats.corrections_kept, 2);
    }

    #[tokio::test]
    async fn failed_page_is_skipped_and_neighbours_are_compared() {
        let client = ScriptedClient::new(vec![
            fenced(&["p0"]),
            unavailable(),
            fenced(&["p2"]),
            fenced(&["p0 fixed", "p2 fixed"]),
        ]);
        let pipeline = DocumentPipeline::new(client.clone());

        let (pages, stats) = pipeline.run(blank_pages(3)).await;

        assert_eq!(
            pages,
            vec![
                PageMarkdown::new(0, "p0 fixed"),
                PageMarkdown::new(2, "p2 fixed"),
            ]
        );
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.pages_seen, 3);

        // The only correction request pairs page 0 with page 2.
        let requests = client.requests();
        assert_eq!(requests.len(), 4);
        let correction = serde_json::to_string(&requests[3]).unwrap();
        assert!(correction.contains("p0") && correction.contains("p2"));
    }

    #[tokio::test]
    async fn failures_before_first_success_leave_nothing_held() {
        let client = ScriptedClient::new(vec![
            Ok(vec!["no fence".to_string()]),
            unavailable(),
            fenced(&["p2"]),
        ]);
        let pipeline = DocumentPipeline::new(client.clone());

        let (pages, _) = pipeline.run(blank_pages(3)).await;

        assert_eq!(pages, vec![PageMarkdown::new(2, "p2")]);
        assert_eq!(client.requests().len(), 3, "no correction is attempted");
    }

    #[tokio::test]
    async fn all_pages_failing_yields_empty_stream() {
        let client = ScriptedClient::new(vec![unavailable(), unavailable()]);
        let pipeline = DocumentPipeline::new(client);

        let (pages, stats) = pipeline.run(blank_pages(2)).await;

        assert!(pages.is_empty());
        assert_eq!(stats.pages_failed, 2);
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        DocumentStart(usize),
        PageStart(usize),
        PageComplete(usize, usize),
        PageError(usize),
        OverlapChecked(usize, usize, bool),
        DocumentComplete(usize, usize),
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: std::sync::Mutex<Vec<Event>>,
    }

    impl RecordingProgress {
        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl crate::progress::PipelineProgressCallback for RecordingProgress {
        fn on_document_start(&self, total_pages: usize) {
            self.push(Event::DocumentStart(total_pages));
        }
        fn on_page_start(&self, page_index: usize, _total_pages: usize) {
            self.push(Event::PageStart(page_index));
        }
        fn on_page_complete(&self, page_index: usize, _total_pages: usize, markdown_len: usize) {
            self.push(Event::PageComplete(page_index, markdown_len));
        }
        fn on_page_error(&self, page_index: usize, _total_pages: usize, _error: &str) {
            self.push(Event::PageError(page_index));
        }
        fn on_overlap_checked(&self, previous_index: usize, current_index: usize, corrected: bool) {
            self.push(Event::OverlapChecked(previous_index, current_index, corrected));
        }
        fn on_document_complete(&self, total_pages: usize, converted_pages: usize) {
            self.push(Event::DocumentComplete(total_pages, converted_pages));
        }
    }

    #[tokio::test]
    async fn progress_hooks_follow_the_walk() {
        let client = ScriptedClient::new(vec![
            fenced(&["p0"]),
            unavailable(),
            fenced(&["p2"]),
            fenced(&["p0 fixed", "p2 fixed"]),
        ]);
        let recorder = Arc::new(RecordingProgress::default());
        let pipeline = DocumentPipeline::new(client).with_progress(recorder.clone());

        let (pages, _) = pipeline.run(blank_pages(3)).await;

        assert_eq!(
            pages,
            vec![
                PageMarkdown::new(0, "p0 fixed"),
                PageMarkdown::new(2, "p2 fixed"),
            ]
        );
        assert_eq!(
            recorder.events(),
            vec![
                Event::DocumentStart(3),
                Event::PageStart(0),
                Event::PageComplete(0, 2),
                Event::PageStart(1),
                Event::PageError(1),
                Event::PageStart(2),
                Event::PageComplete(2, 2),
                Event::OverlapChecked(0, 2, true),
                Event::DocumentComplete(3, 2),
            ]
        );
    }

    #[tokio::test]
    async fn empty_document_yields_nothing() {
        let client = ScriptedClient::new(vec![]);
        let pipeline = DocumentPipeline::new(client.clone());

        let (pages, _) = pipeline.run(Vec::new()).await;

        assert!(pages.is_empty());
        assert!(client.requests().is_empty());
    }
}
