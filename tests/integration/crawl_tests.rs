//! Integration tests for the search coordinator
//!
//! These tests use wiremock to serve OpenGrok-style result pages and test
//! the full search cycle end-to-end.

use ogre_scrape::config::CrawlSettings;
use ogre_scrape::crawler::{CancelHandle, Coordinator};
use ogre_scrape::output::{Phase, ProgressListener, ResultReceiver};
use ogre_scrape::state::{CrawlState, FileMatch};
use ogre_scrape::url::QueryFields;
use ogre_scrape::ScrapeError;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests for the first result page, which carries no `start` parameter
struct FirstPage;

impl Match for FirstPage {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(name, _)| name == "start")
    }
}

/// Records every event a coordinator reports
#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<(Phase, usize, usize)>>,
    counts: Mutex<Vec<(usize, usize, usize)>>,
    new_files: Mutex<Vec<String>>,
    amended: Mutex<Vec<String>>,
}

impl ProgressListener for Recorder {
    fn progress(&self, phase: Phase, current: usize, pending: usize) {
        self.progress.lock().push((phase, current, pending));
    }

    fn current_counts(&self, dir_count: usize, file_count: usize, line_count: usize) {
        self.counts.lock().push((dir_count, file_count, line_count));
    }
}

impl ResultReceiver for Recorder {
    fn new_file_matches(&self, new_matches: &[Arc<FileMatch>]) {
        let mut files = self.new_files.lock();
        files.extend(new_matches.iter().map(|m| m.full_path()));
    }

    fn new_line_matches(&self, amended: &Arc<FileMatch>) {
        self.amended.lock().push(amended.full_path());
    }
}

/// Cancels the search as soon as the first batch of files arrives
struct CancelOnFirstBatch {
    cancel: CancelHandle,
}

impl ResultReceiver for CancelOnFirstBatch {
    fn new_file_matches(&self, _: &[Arc<FileMatch>]) {
        self.cancel.cancel();
    }

    fn new_line_matches(&self, _: &Arc<FileMatch>) {}
}

fn page(results: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><meta http-equiv="Content-Type" content="text/html; charset=UTF-8"><title>OpenGrok Search</title></head>
<body><div id="page"><div id="header">OpenGrok</div>
<div id="results">{}</div>
<div id="footer">footer</div></div></body></html>"#,
        results
    )
}

fn dir_row(dir: &str) -> String {
    format!(
        r#"<tr class="dir"><td colspan="3"><a href="/source/xref{}">{}</a></td></tr>"#,
        dir, dir
    )
}

fn file_row(dir: &str, file: &str, lines: &str) -> String {
    format!(
        r#"<tr><td class="q"><a href="/source/history{dir}{file}">H</a></td><td class="f"><a href="/source/xref{dir}{file}">{file}</a></td><td><tt class="con">{lines}</tt></td></tr>"#,
        dir = dir,
        file = file,
        lines = lines
    )
}

fn line(dir: &str, file: &str, number: u32, word: &str) -> String {
    format!(
        r#"<a class="s" href="/source/xref{}{}#{}"><span class="l">{}</span> call <b>{}</b>();</a><br/>"#,
        dir, file, number, number, word
    )
}

fn more_link(dir: &str, file: &str) -> String {
    format!(
        r#"<a href="/source/more{}{}?full=foo&t=1">[all...]</a>"#,
        dir, file
    )
}

fn pager(starts: &[u32]) -> String {
    let links: String = starts
        .iter()
        .map(|s| {
            format!(
                r#"<a class="more" href="search?q=foo&amp;start={}">{}</a>"#,
                s,
                s / 25 + 1
            )
        })
        .collect();
    format!(r#"<p class="slider">{}</p>"#, links)
}

fn results(rows: &[String], pager_starts: &[u32]) -> String {
    page(&format!(
        "<table>{}</table>{}",
        rows.concat(),
        if pager_starts.is_empty() {
            String::new()
        } else {
            pager(pager_starts)
        }
    ))
}

fn more_page(dir: &str, file: &str, numbers: &[u32]) -> String {
    let lines: String = numbers.iter().map(|&n| line(dir, file, n, "foo")).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>more</title></head>
<body><div id="page"><div id="content"><div id="more"><pre>{}</pre></div></div></div></body></html>"#,
        lines
    )
}

/// Mounts the entry page and returns the settings for searching the mock server
async fn setup(mock_server: &MockServer) -> CrawlSettings {
    Mock::given(method("GET"))
        .and(path("/source/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body/></html>"))
        .mount(mock_server)
        .await;

    let base = Url::parse(&format!("{}/source/", mock_server.uri())).unwrap();
    CrawlSettings::new(base)
}

async fn mount_page(mock_server: &MockServer, start: Option<&str>, body: String, hits: u64) {
    let mock = Mock::given(method("GET"))
        .and(path("/source/search"))
        .and(query_param("q", "foo"));
    let mock = match start {
        Some(start) => mock.and(query_param("start", start)),
        None => mock.and(FirstPage),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(hits)
        .mount(mock_server)
        .await;
}

fn foo() -> QueryFields {
    QueryFields::new().text("foo")
}

#[tokio::test]
async fn test_single_page_two_files() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server)
        .await
        .with_page_limit(Some(5))
        .with_fetch_lines(false);

    let body = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "a.c", &line("/src/", "a.c", 12, "foo")),
            file_row(
                "/src/",
                "b.c",
                &format!("{}{}", line("/src/", "b.c", 3, "foo"), line("/src/", "b.c", 9, "foo")),
            ),
        ],
        &[],
    );
    mount_page(&mock_server, None, body, 1).await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.file_count(), 2);
    assert_eq!(result.dir_count(), 1);
    assert_eq!(result.line_count(), 3);
    assert!(!result.page_limit_triggered());
    assert!(!result.aborted());
    assert_eq!(result.fetched_page_count(), 1);
    assert_eq!(result.unfetched_page_count(), 0);

    let a = result.file("/src/a.c").unwrap();
    let lines = a.lines();
    assert_eq!(lines[0].line_number(), 12);
    assert_eq!(lines[0].text(), " call foo();");
    assert_eq!(lines[0].highlighted_parts(), vec!["foo"]);
    assert_eq!(
        a.xref_link().unwrap().url.as_str(),
        format!("{}/source/xref/src/a.c", mock_server.uri())
    );

    assert_eq!(coordinator.state(), CrawlState::Done);
}

#[tokio::test]
async fn test_deferred_line_fetch() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    let page1 = results(
        &[
            dir_row("/src/"),
            file_row(
                "/src/",
                "a.c",
                &format!("{}{}", line("/src/", "a.c", 12, "foo"), more_link("/src/", "a.c")),
            ),
        ],
        &[25],
    );
    let page2 = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "b.c", &line("/src/", "b.c", 3, "foo")),
        ],
        &[0, 25],
    );
    mount_page(&mock_server, None, page1, 1).await;
    mount_page(&mock_server, Some("25"), page2, 1).await;

    Mock::given(method("GET"))
        .and(path("/source/more/src/a.c"))
        .and(query_param("t", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(more_page("/src/", "a.c", &[12, 40, 41])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let mut coordinator = Coordinator::new(settings).unwrap();
    coordinator.add_progress_listener(recorder.clone());
    coordinator.add_result_receiver(recorder.clone());

    let result = coordinator.search(&foo()).await.unwrap();

    let a = result.file("/src/a.c").unwrap();
    assert!(!a.is_abridged());
    assert_eq!(a.line_count(), 3);
    assert_eq!(result.line_count(), 4);
    assert_eq!(result.fetched_page_count(), 2);
    assert!(!result.page_limit_triggered());

    // The line list is fetched only after both pages
    assert_eq!(
        *recorder.progress.lock(),
        vec![
            (Phase::PageFetch, 0, 1),
            (Phase::PageFetch, 1, 2),
            (Phase::LineFetch, 2, 1),
        ]
    );
    assert_eq!(*recorder.new_files.lock(), vec!["/src/a.c", "/src/b.c"]);
    assert_eq!(*recorder.amended.lock(), vec!["/src/a.c"]);
    assert_eq!(recorder.counts.lock().last(), Some(&(1, 2, 4)));
}

#[tokio::test]
async fn test_interleaved_line_fetch() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await.with_fetch_lines_last(false);

    let page1 = results(
        &[
            dir_row("/src/"),
            file_row(
                "/src/",
                "a.c",
                &format!("{}{}", line("/src/", "a.c", 12, "foo"), more_link("/src/", "a.c")),
            ),
        ],
        &[25],
    );
    let page2 = results(
        &[
            dir_row("/lib/"),
            file_row("/lib/", "b.c", &line("/lib/", "b.c", 3, "foo")),
        ],
        &[0, 25],
    );
    mount_page(&mock_server, None, page1, 1).await;
    mount_page(&mock_server, Some("25"), page2, 1).await;

    Mock::given(method("GET"))
        .and(path("/source/more/src/a.c"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(more_page("/src/", "a.c", &[12, 40])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let mut coordinator = Coordinator::new(settings).unwrap();
    coordinator.add_progress_listener(recorder.clone());

    let result = coordinator.search(&foo()).await.unwrap();

    // The line list is fetched between the two pages
    let phases: Vec<Phase> = recorder.progress.lock().iter().map(|p| p.0).collect();
    assert_eq!(
        phases,
        vec![Phase::PageFetch, Phase::LineFetch, Phase::PageFetch]
    );
    assert_eq!(result.dir_count(), 2);
    assert_eq!(result.line_count(), 3);
    assert_eq!(result.abridged_file_count(), 0);
}

#[tokio::test]
async fn test_page_limit() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await.with_page_limit(Some(1));

    let page1 = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "a.c", &line("/src/", "a.c", 1, "foo")),
        ],
        &[25, 50],
    );
    mount_page(&mock_server, None, page1, 1).await;
    mount_page(&mock_server, Some("25"), results(&[], &[]), 0).await;
    mount_page(&mock_server, Some("50"), results(&[], &[]), 0).await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.fetched_page_count(), 1);
    assert!(result.page_limit_triggered());
    assert_eq!(result.unfetched_page_count(), 2);
    assert!(!result.aborted());
}

#[tokio::test]
async fn test_unlimited_pages_dedupe_files() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server)
        .await
        .with_page_limit(None)
        .with_fetch_lines(false);

    let page1 = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "a.c", &line("/src/", "a.c", 1, "foo")),
        ],
        &[25, 50],
    );
    // Every page links to every other page
    let page2 = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "a.c", &line("/src/", "a.c", 99, "foo")),
        ],
        &[0, 25, 50],
    );
    let page3 = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "c.c", &line("/src/", "c.c", 5, "foo")),
        ],
        &[0, 25, 50],
    );
    mount_page(&mock_server, None, page1, 1).await;
    mount_page(&mock_server, Some("25"), page2, 1).await;
    mount_page(&mock_server, Some("50"), page3, 1).await;

    let recorder = Arc::new(Recorder::default());
    let mut coordinator = Coordinator::new(settings).unwrap();
    coordinator.add_result_receiver(recorder.clone());

    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.fetched_page_count(), 3);
    assert_eq!(result.unfetched_page_count(), 0);
    assert!(!result.page_limit_triggered());
    assert_eq!(result.file_count(), 2);
    assert_eq!(result.line_count(), 3);
    assert_eq!(result.file("/src/a.c").unwrap().line_count(), 2);

    assert_eq!(*recorder.new_files.lock(), vec!["/src/a.c", "/src/c.c"]);
    assert_eq!(*recorder.amended.lock(), vec!["/src/a.c"]);
}

#[tokio::test]
async fn test_cancel_after_first_page() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    let page1 = results(
        &[
            dir_row("/src/"),
            file_row(
                "/src/",
                "a.c",
                &format!("{}{}", line("/src/", "a.c", 1, "foo"), more_link("/src/", "a.c")),
            ),
        ],
        &[25],
    );
    mount_page(&mock_server, None, page1, 1).await;
    mount_page(&mock_server, Some("25"), results(&[], &[]), 0).await;

    Mock::given(method("GET"))
        .and(path("/source/more/src/a.c"))
        .respond_with(ResponseTemplate::new(200).set_body_string(more_page("/src/", "a.c", &[1])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut coordinator = Coordinator::new(settings).unwrap();
    let cancel = coordinator.cancel_handle();
    coordinator.add_result_receiver(Arc::new(CancelOnFirstBatch { cancel }));
    let coordinator = Arc::new(coordinator);

    let handle = coordinator.start(foo()).unwrap();
    let result = handle.wait().await.unwrap();

    assert!(result.aborted());
    assert_eq!(result.fetched_page_count(), 1);
    assert_eq!(result.file_count(), 1);
    assert!(result.file("/src/a.c").unwrap().is_abridged());
    assert_eq!(coordinator.state(), CrawlState::Done);

    // A new search starts with the flag cleared
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_redirect_resolution() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/grok"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/source/", mock_server.uri()).as_str()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    let _ = setup(&mock_server).await;

    let body = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "a.c", &line("/src/", "a.c", 1, "foo")),
        ],
        &[],
    );
    mount_page(&mock_server, None, body, 1).await;

    let entry = Url::parse(&format!("{}/grok", mock_server.uri())).unwrap();
    let coordinator = Coordinator::new(CrawlSettings::new(entry)).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.file_count(), 1);
}

#[tokio::test]
async fn test_referer_is_sent_for_later_pages() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await.with_fetch_lines(false);

    mount_page(&mock_server, None, results(&[], &[25]), 1).await;

    let referer = format!("{}/source/search?q=foo", mock_server.uri());
    Mock::given(method("GET"))
        .and(path("/source/search"))
        .and(query_param("start", "25"))
        .and(header("referer", referer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(results(&[], &[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.fetched_page_count(), 2);
}

#[tokio::test]
async fn test_no_results_page() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    // OpenGrok leaves the results div open on this page
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>OpenGrok Search</title></head>
<body><div id="page"><div id="results"><p>Your search <b>foo</b> did not match any files.</p>
<ul><li>check the spelling</li></ul>
<div id="footer">footer</div></div></body></html>"#;
    mount_page(&mock_server, None, body.to_string(), 1).await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.file_count(), 0);
    assert_eq!(result.fetched_page_count(), 1);
    assert!(!result.page_limit_triggered());
}

#[tokio::test]
async fn test_latin1_page() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await.with_fetch_lines(false);

    let body = results(
        &[
            dir_row("/src/"),
            file_row("/src/", "grün.c", &line("/src/", "grün.c", 1, "foo")),
        ],
        &[],
    );
    let latin1: Vec<u8> = body.chars().map(|c| c as u8).collect();

    Mock::given(method("GET"))
        .and(path("/source/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(latin1, "text/html; charset=ISO-8859-1"),
        )
        .mount(&mock_server)
        .await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert!(result.file("/src/grün.c").is_some());
}

#[tokio::test]
async fn test_server_error_fails_search() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/source/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await;

    assert!(matches!(result, Err(ScrapeError::Http { .. })));
    assert_eq!(coordinator.state(), CrawlState::Failed);
}

#[tokio::test]
async fn test_unparseable_page_fails_search() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    mount_page(
        &mock_server,
        None,
        "<html><body><div id=\"page\"></body></html>".to_string(),
        1,
    )
    .await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await;

    assert!(matches!(result, Err(ScrapeError::Document { .. })));
}

#[tokio::test]
async fn test_file_row_without_dir_row_fails_search() {
    let mock_server = MockServer::start().await;
    let settings = setup(&mock_server).await;

    let body = results(
        &[file_row("/src/", "a.c", &line("/src/", "a.c", 1, "foo"))],
        &[],
    );
    mount_page(&mock_server, None, body, 1).await;

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await;

    match result {
        Err(ScrapeError::Parse(message)) => {
            assert!(message.contains("without preceding dir row"))
        }
        other => panic!("expected parse error, got {:?}", other.map(|r| r.file_count())),
    }
}

#[tokio::test]
async fn test_zero_page_limit_contacts_nobody() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let base = Url::parse(&format!("{}/source/", mock_server.uri())).unwrap();
    let settings = CrawlSettings::new(base).with_page_limit(Some(0));

    let coordinator = Coordinator::new(settings).unwrap();
    let result = coordinator.search(&foo()).await.unwrap();

    assert_eq!(result.fetched_page_count(), 0);
    assert_eq!(result.file_count(), 0);
}
