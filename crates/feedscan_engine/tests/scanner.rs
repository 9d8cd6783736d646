use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Once};
use std::time::Duration;

use feedscan_core::{StopReason, TypeFilter, NO_CANDIDATE};
use feedscan_engine::{
    CaptureError, ChannelProgressSink, CredentialCapture, CredentialStore, Credentials,
    FeedScanner, FetchSettings, NullProgressSink, ReqwestFetcher, ScanError, ScanEvent,
    ScanRequest, ScanSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scan_logging::initialize_for_tests);
}

/// Capture double that hands out a fixed credential and counts invocations.
#[derive(Clone)]
struct MockCapture {
    credentials: Option<Credentials>,
    hangs: bool,
    calls: Arc<AtomicUsize>,
}

impl MockCapture {
    fn returning(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            hangs: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing() -> Self {
        Self {
            credentials: None,
            hangs: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never observes a matching request, like a browser stuck on a slow page.
    fn hanging() -> Self {
        Self {
            hangs: true,
            ..Self::failing()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialCapture for MockCapture {
    async fn capture(&self) -> Result<Credentials, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hangs {
            std::future::pending::<()>().await;
        }
        self.credentials.clone().ok_or(CaptureError::Timeout {
            seed_url: "https://feed.example.com/topic".to_string(),
            waited: Duration::from_secs(1),
        })
    }
}

struct Harness {
    server: MockServer,
    _dir: TempDir,
    store: CredentialStore,
}

impl Harness {
    async fn new() -> Self {
        init_logging();
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        Self {
            server: MockServer::start().await,
            _dir: dir,
            store,
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}/feed?page={page}", self.server.uri())
    }

    fn credentials(&self, token: &str) -> Credentials {
        Credentials {
            url: self.page_url(1),
            method: "GET".to_string(),
            headers: BTreeMap::from([("authorization".to_string(), format!("Bearer {token}"))]),
        }
    }

    fn scanner(&self, capture: &MockCapture, settings: ScanSettings) -> FeedScanner {
        FeedScanner::new(
            self.store.clone(),
            ReqwestFetcher::new(FetchSettings::default()).unwrap(),
            capture.clone(),
            settings,
        )
    }

    /// Serves `cards` as `(id, type, upvotes)` on `page`, linking to the next page.
    async fn serve_page(&self, page: u32, cards: &[(&str, &str, i64)]) {
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
                cards,
                &self.page_url(page + 1),
            )))
            .mount(&self.server)
            .await;
    }

    async fn serve_empty(&self, page: u32) {
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }
}

fn page_json(cards: &[(&str, &str, i64)], next: &str) -> serde_json::Value {
    let cards: Vec<_> = cards
        .iter()
        .map(|(id, item_type, upvotes)| {
            json!({
                "id": id,
                "type": item_type,
                "category": "science",
                "title": format!("Title {id}"),
                "abstract": format!("Abstract {id}"),
                "url": format!("https://feed.example.com/{id}"),
                "provider": {"name": "Example News"},
                "reactionSummary": {"subReactionSummaries": [
                    {"type": "upvote", "totalCount": upvotes},
                    {"type": "laugh", "totalCount": 1000}
                ]}
            })
        })
        .collect();
    json!({ "nextPageUrl": next, "sections": [{ "cards": cards }] })
}

fn request(budget: usize, filter: &str) -> ScanRequest {
    ScanRequest {
        budget,
        filter: filter.parse().unwrap(),
    }
}

#[tokio::test]
async fn three_pages_return_global_maximum() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_page(1, &[("a", "article", 5), ("b", "article", 9)]).await;
    h.serve_page(2, &[("c", "article", 9), ("d", "video", 12)]).await;
    h.serve_page(3, &[("e", "article", 3), ("f", "article", 1)]).await;
    h.serve_empty(4).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());
    let (tx, rx) = mpsc::channel();
    let sink = ChannelProgressSink::new(tx);

    let outcome = scanner
        .scan(request(100, "all"), &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.like_count, 12);
    assert_eq!(outcome.scanned, 6);
    assert_eq!(outcome.reason, StopReason::EndOfResults);
    let best = outcome.best.unwrap();
    assert_eq!(best.id, "d");
    assert_eq!(best.provider, "Example News");
    assert_eq!(capture.calls(), 0);

    let percents: Vec<f64> = rx
        .try_iter()
        .filter_map(|event| match event {
            ScanEvent::Progress(progress) => Some(progress.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![2.0, 4.0, 6.0, 100.0]);
}

#[tokio::test]
async fn stored_credentials_are_reused_across_scans() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_page(1, &[("a", "article", 1), ("b", "article", 2)]).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    for _ in 0..2 {
        let (best, likes) = scanner.scan_for_best_candidate(2, "all").await.unwrap();
        assert_eq!(best.unwrap().id, "b");
        assert_eq!(likes, 2);
    }
    assert_eq!(capture.calls(), 0);
}

#[tokio::test]
async fn missing_credentials_are_captured_and_stored() {
    let h = Harness::new().await;
    h.serve_page(1, &[("a", "article", 3)]).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let (best, likes) = scanner.scan_for_best_candidate(1, "all").await.unwrap();
    assert_eq!(best.unwrap().id, "a");
    assert_eq!(likes, 3);
    assert_eq!(capture.calls(), 1);
    assert_eq!(h.store.load(), Some(h.credentials("fresh")));
}

#[tokio::test]
async fn capture_failure_at_startup_is_fatal() {
    let h = Harness::new().await;
    let capture = MockCapture::failing();
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let err = scanner.scan_for_best_candidate(10, "all").await.unwrap_err();
    assert!(matches!(err, ScanError::Capture(CaptureError::Timeout { .. })));
    assert_eq!(h.store.load(), None);
}

#[tokio::test]
async fn rejection_recaptures_once_and_resumes_same_page() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("stale")).unwrap();

    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            &[("a", "article", 4)],
            &h.page_url(2),
        )))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            &[("b", "video", 8)],
            &h.page_url(3),
        )))
        .expect(1)
        .mount(&h.server)
        .await;
    h.serve_empty(3).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());
    let (tx, rx) = mpsc::channel();

    let outcome = scanner
        .scan(request(100, "all"), &ChannelProgressSink::new(tx), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(capture.calls(), 1);
    assert_eq!(outcome.best.unwrap().id, "b");
    assert_eq!(outcome.scanned, 2);
    assert_eq!(h.store.load(), Some(h.credentials("fresh")));
    assert!(rx
        .try_iter()
        .any(|event| event == ScanEvent::Reauthenticating { attempt: 1 }));
}

#[tokio::test]
async fn persistent_rejection_exhausts_reauth_bound() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("stale")).unwrap();
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;

    let capture = MockCapture::returning(h.credentials("also-rejected"));
    let settings = ScanSettings {
        max_reauth_attempts: Some(2),
    };
    let mut scanner = h.scanner(&capture, settings);

    let err = scanner.scan_for_best_candidate(10, "all").await.unwrap_err();
    match err {
        ScanError::AuthExhausted { attempts, url } => {
            assert_eq!(attempts, 3);
            assert_eq!(url, h.page_url(1));
        }
        other => panic!("expected AuthExhausted, got {other:?}"),
    }
    assert_eq!(capture.calls(), 2);
}

#[tokio::test]
async fn empty_first_page_ends_without_candidate() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_empty(1).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let outcome = scanner
        .scan(request(50, "all"), &NullProgressSink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.best, None);
    assert_eq!(outcome.like_count, NO_CANDIDATE);
    assert_eq!(outcome.scanned, 0);
    assert_eq!(outcome.reason, StopReason::EndOfResults);
}

#[tokio::test]
async fn malformed_page_is_a_protocol_error() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_page(1, &[("a", "article", 7)]).await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&h.server)
        .await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let err = scanner.scan_for_best_candidate(100, "all").await.unwrap_err();
    match err {
        ScanError::Protocol { url, snippet, .. } => {
            assert_eq!(url, h.page_url(2));
            assert_eq!(snippet, "<html>captcha</html>");
        }
        other => panic!("expected Protocol, got {other:?}"),
    }
    assert_eq!(capture.calls(), 0);
}

#[tokio::test]
async fn type_filter_only_returns_matching_cards() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_page(1, &[("a", "article", 50), ("v", "video", 4), ("w", "webcontent", 90)])
        .await;
    h.serve_empty(2).await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let (best, likes) = scanner.scan_for_best_candidate(100, "video").await.unwrap();
    let best = best.unwrap();
    assert_eq!(best.item_type, "video");
    assert_eq!(likes, 4);

    let (best, likes) = scanner.scan_for_best_candidate(100, "all").await.unwrap();
    assert_eq!(best.unwrap().id, "w");
    assert_eq!(likes, 90);
}

#[tokio::test]
async fn budget_is_checked_after_whole_page() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    h.serve_page(
        1,
        &[
            ("a", "article", 1),
            ("b", "article", 2),
            ("c", "article", 3),
            ("d", "article", 4),
            ("e", "article", 5),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());

    let outcome = scanner
        .scan(request(1, "all"), &NullProgressSink, &CancellationToken::new())
        .await
        .unwrap();
    // Overshoots the budget of 1 by the rest of the page.
    assert_eq!(outcome.scanned, 5);
    assert_eq!(outcome.like_count, 5);
    assert_eq!(outcome.reason, StopReason::BudgetReached);
}

#[tokio::test]
async fn cancelled_scan_sends_no_requests() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("good")).unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let capture = MockCapture::returning(h.credentials("fresh"));
    let mut scanner = h.scanner(&capture, ScanSettings::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = scanner
        .scan(
            ScanRequest {
                budget: 10,
                filter: TypeFilter::All,
            },
            &NullProgressSink,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.like_count, NO_CANDIDATE);
}

#[tokio::test]
async fn cancel_interrupts_initial_capture() {
    let h = Harness::new().await;
    let capture = MockCapture::hanging();
    let mut scanner = h.scanner(&capture, ScanSettings::default());
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        scanner.scan(request(10, "all"), &NullProgressSink, &cancel),
    )
    .await
    .expect("capture should stop on cancel")
    .unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.best, None);
    assert_eq!(capture.calls(), 1);
    assert_eq!(h.store.load(), None);
}

#[tokio::test]
async fn cancel_interrupts_recapture() {
    let h = Harness::new().await;
    h.store.save(&h.credentials("stale")).unwrap();
    h.serve_page(1, &[("a", "article", 6)]).await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let capture = MockCapture::hanging();
    let mut scanner = h.scanner(&capture, ScanSettings::default());
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        }
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        scanner.scan(request(100, "all"), &NullProgressSink, &cancel),
    )
    .await
    .expect("recapture should stop on cancel")
    .unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.like_count, 6);
    assert_eq!(outcome.scanned, 1);
    assert_eq!(capture.calls(), 1);
}
