use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extractor;
use crate::fetcher::{Documents, Fetcher};
use crate::sink::SinkWriter;

/// Phase of a single crawl run. Fetching and extracting interleave per
/// document; the final `Writing` step finalizes the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Extracting,
    Writing,
    Done,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Extracting)
                | (Fetching, Writing)
                | (Extracting, Fetching)
                | (Extracting, Writing)
                | (Writing, Fetching)
                | (Writing, Done)
        )
    }
}

struct Run {
    state: RunState,
}

impl Run {
    fn new() -> Self {
        Run {
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Counts returned after a crawl run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub documents: usize,
    pub fetched: usize,
    pub failed: usize,
    pub records: usize,
    pub dropped: usize,
}

/// Fetch every URL and persist the extracted Records through `writer`.
pub async fn crawl(
    fetcher: &Fetcher,
    urls: &[String],
    concurrency: usize,
    writer: SinkWriter,
) -> Result<CrawlStats> {
    let docs = fetcher.fetch_all(urls.to_vec(), concurrency);
    process(docs, urls.len(), writer).await
}

/// Drain fetched documents into the sink.
///
/// Fetch failures are contained: the URL contributes no Records and the run
/// continues. Sink errors abort the run and abandon the writer.
pub async fn process(
    mut docs: Documents,
    total: usize,
    mut writer: SinkWriter,
) -> Result<CrawlStats> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut run = Run::new();
    let mut stats = CrawlStats::default();
    run.advance(RunState::Fetching);

    while let Some(doc) = docs.next().await {
        stats.documents += 1;
        pb.inc(1);

        let doc = match doc {
            Ok(doc) => doc,
            Err(e) if e.is_document_level() => {
                warn!("Skipping document: {}", e);
                stats.failed += 1;
                continue;
            }
            Err(e) => {
                pb.finish_and_clear();
                writer.abandon();
                return Err(e);
            }
        };
        stats.fetched += 1;

        run.advance(RunState::Extracting);
        let extraction = extractor::extract(&doc.html);
        stats.dropped += extraction.dropped;
        debug!(
            "{}: {} records, {} dropped",
            doc.url,
            extraction.records.len(),
            extraction.dropped
        );

        if writer.is_streaming() && !extraction.records.is_empty() {
            run.advance(RunState::Writing);
        }
        for record in &extraction.records {
            if let Err(e) = writer.emit(record) {
                pb.finish_and_clear();
                writer.abandon();
                return Err(e);
            }
        }
        stats.records += extraction.records.len();
        run.advance(RunState::Fetching);
    }

    pb.finish_and_clear();

    run.advance(RunState::Writing);
    let format = writer.format();
    writer.finalize()?;
    run.advance(RunState::Done);

    info!(
        "Crawl ({:?}) done: {} documents ({} ok, {} failed), {} records, {} dropped",
        format, stats.documents, stats.fetched, stats.failed, stats.records, stats.dropped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::Error;
    use crate::fetcher::client_builder;
    use crate::loader;
    use crate::record::Document;
    use crate::settings::FetchSettings;
    use crate::sink::SinkFormat;
    use crate::snapshot;
    use crate::testing::{fixture, serve};

    fn doc(url: &str, name: &str) -> Result<Document> {
        Ok(Document {
            url: url.to_string(),
            html: fixture(name),
        })
    }

    fn not_found(url: &str) -> Result<Document> {
        Err(Error::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        })
    }


    #[test]
    fn state_transitions() {
        use RunState::*;
        assert!(Idle.can_advance_to(Fetching));
        assert!(Extracting.can_advance_to(Writing));
        assert!(Writing.can_advance_to(Done));
        assert!(!Idle.can_advance_to(Writing));
        assert!(!Done.can_advance_to(Fetching));
        assert!(!Fetching.can_advance_to(Done));
    }

    #[tokio::test]
    async fn second_document_failure_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.jl");
        let writer = SinkWriter::create(SinkFormat::LineDelimited, &path).unwrap();
        let docs = Documents::from_results(vec![doc("http://x/page/1/", "quotes_page1"), not_found("http://x/page/2/")]);

        let stats = process(docs, 2, writer).await.unwrap();
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.records, 10);

        let table = loader::load(&path, SinkFormat::LineDelimited).unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(table.row(0).unwrap().author, "Albert Einstein");
    }

    fn sink_failure(path: &std::path::Path) -> Result<Document> {
        Err(Error::Io {
            context: "failed to write sink",
            path: path.to_path_buf(),
            source: std::io::Error::other("disk full"),
        })
    }

    #[tokio::test]
    async fn fatal_error_keeps_written_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.jl");
        let writer = SinkWriter::create(SinkFormat::LineDelimited, &path).unwrap();
        let docs = Documents::from_results(vec![
            doc("http://x/page/1/", "quotes_page1"),
            sink_failure(&path),
            doc("http://x/page/2/", "quotes_page2"),
        ]);

        let err = process(docs, 3, writer).await.unwrap_err();
        assert!(!err.is_document_level());

        let table = loader::load(&path, SinkFormat::LineDelimited).unwrap();
        assert_eq!(table.len(), 10);
    }

    #[tokio::test]
    async fn fatal_error_produces_no_array_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let writer = SinkWriter::create(SinkFormat::SingleArray, &path).unwrap();
        let docs = Documents::from_results(vec![
            doc("http://x/page/1/", "quotes_page1"),
            Err(Error::Snapshot {
                path: path.clone(),
                reason: "interrupted".into(),
            }),
        ]);

        assert!(process(docs, 2, writer).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_document_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let writer = SinkWriter::create(SinkFormat::SingleArray, &path).unwrap();
        let docs = Documents::from_results(vec![Ok(Document {
            url: "http://x/".into(),
            html: "<html><body></body></html>".into(),
        })]);

        let stats = process(docs, 1, writer).await.unwrap();
        assert_eq!(stats.records, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn encodings_load_to_equal_row_multisets() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = Vec::new();
        for format in SinkFormat::ALL {
            let path = dir.path().join(format!("q.{}", format.extension()));
            let writer = SinkWriter::create(format, &path).unwrap();
            let docs = Documents::from_results(vec![
                doc("http://x/page/2/", "quotes_page2"),
                doc("http://x/page/1/", "quotes_page1"),
            ]);
            process(docs, 2, writer).await.unwrap();
            tables.push(loader::load(&path, format).unwrap());
        }

        let mut a: Vec<_> = tables[0].rows().collect();
        let mut b: Vec<_> = tables[1].rows().collect();
        // row order follows sink order in both
        assert_eq!(a, b);
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[tokio::test]
    async fn two_pages_end_to_end() {
        let server = serve(vec![
            ("/page/1/", fixture("quotes_page1")),
            ("/page/2/", fixture("quotes_page2")),
        ])
        .await;
        let urls = vec![server.url("/page/1/"), server.url("/page/2/")];
        let fetcher = Fetcher::from_builder(client_builder(&FetchSettings::default()).no_proxy()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let jl = dir.path().join("quotes.jl");
        let stats = crawl(&fetcher, &urls, 1, SinkWriter::create(SinkFormat::LineDelimited, &jl).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.records, 20);
        assert_eq!(fs::read_to_string(&jl).unwrap().lines().count(), 20);

        let json = dir.path().join("quotes.json");
        crawl(&fetcher, &urls, 2, SinkWriter::create(SinkFormat::SingleArray, &json).unwrap())
            .await
            .unwrap();
        let array: Vec<serde_json::Value> = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
        assert_eq!(array.len(), 20);

        for (path, format) in [(&jl, SinkFormat::LineDelimited), (&json, SinkFormat::SingleArray)] {
            let table = loader::load(path, format).unwrap();
            assert_eq!(table.len(), 20);
            assert_eq!(table.column_names(), vec!["author", "tags", "text"]);

            let snap = dir.path().join(format!("quotes.{}.table", format.extension()));
            let bytes = snapshot::save(&table, &snap).unwrap();
            assert!(bytes > 0);
            assert!(fs::metadata(&snap).unwrap().len() > 0);
        }
    }
}
