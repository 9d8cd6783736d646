use std::collections::VecDeque;

use feedscan_core::{update, Candidate, Effect, Msg, ScanSession, StopReason, TypeFilter};
use scan_logging::{scan_debug, scan_info, scan_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::page::{decode_page, PageBody};
use crate::{
    CaptureError, CredentialCapture, CredentialStore, Credentials, FailureKind, FetchError,
    NullProgressSink, PageFetcher, PersistError, ProgressSink, ScanEvent,
};

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Consecutive rejections tolerated before giving up; `None` retries forever.
    pub max_reauth_attempts: Option<u32>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_reauth_attempts: Some(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub budget: usize,
    pub filter: TypeFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub best: Option<Candidate>,
    /// Like count of `best`, or `-1` when no card matched.
    pub like_count: i64,
    pub scanned: usize,
    pub reason: StopReason,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("credential capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("undecodable feed page from {url}: {message} (body starts with {snippet:?})")]
    Protocol {
        url: String,
        snippet: String,
        message: String,
    },
    #[error("credential record unavailable: {0}")]
    Persist(#[from] PersistError),
    #[error("feed kept rejecting credentials after {attempts} recaptures at {url}")]
    AuthExhausted { attempts: u32, url: String },
    #[error("scan stopped without reaching a terminal state at {url}")]
    Stalled { url: String },
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Drives the scan state machine: ensures credentials, follows next-page links,
/// and recaptures credentials whenever the feed rejects a request.
pub struct FeedScanner {
    store: CredentialStore,
    fetcher: Box<dyn PageFetcher>,
    capture: Box<dyn CredentialCapture>,
    settings: ScanSettings,
}

impl FeedScanner {
    pub fn new(
        store: CredentialStore,
        fetcher: impl PageFetcher + 'static,
        capture: impl CredentialCapture + 'static,
        settings: ScanSettings,
    ) -> Self {
        Self {
            store,
            fetcher: Box::new(fetcher),
            capture: Box::new(capture),
            settings,
        }
    }

    /// Scans up to `budget` cards and returns the most upvoted one matching `only_type`
    /// together with its like count (`-1` when nothing matched).
    pub async fn scan_for_best_candidate(
        &mut self,
        budget: usize,
        only_type: &str,
    ) -> Result<(Option<Candidate>, i64), ScanError> {
        let filter = only_type.parse().unwrap_or_default();
        let outcome = self
            .scan(
                ScanRequest { budget, filter },
                &NullProgressSink,
                &CancellationToken::new(),
            )
            .await?;
        Ok((outcome.best, outcome.like_count))
    }

    /// Runs one scan session.
    ///
    /// Takes `&mut self` so a scanner never runs two sessions against its
    /// credential record at once.
    pub async fn scan(
        &mut self,
        request: ScanRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome, ScanError> {
        scan_info!(
            "Starting scan: budget={} filter={}",
            request.budget,
            request.filter
        );
        let session = ScanSession::new(
            request.budget,
            request.filter,
            self.settings.max_reauth_attempts,
        );
        let Some(mut credentials) = self.ensure_credentials(cancel).await? else {
            let (session, _) = update(session, Msg::Cancelled);
            return Ok(finished(&session, StopReason::Cancelled, sink));
        };

        let (mut session, effects) = update(
            session,
            Msg::Started {
                seed_url: credentials.url.clone(),
            },
        );
        let mut pending: VecDeque<Effect> = effects.into();

        while let Some(effect) = pending.pop_front() {
            let msg = match effect {
                Effect::Fetch { url } => self.fetch_page(&url, &credentials, cancel).await?,
                Effect::Recapture { attempt } => {
                    scan_warn!("Feed rejected credentials; recapture attempt {}", attempt);
                    sink.emit(ScanEvent::Reauthenticating { attempt });
                    match self.recapture(cancel).await? {
                        Some(fresh) => {
                            credentials = fresh;
                            Msg::Recaptured
                        }
                        None => Msg::Cancelled,
                    }
                }
                Effect::ReportProgress(progress) => {
                    sink.emit(ScanEvent::Progress(progress));
                    continue;
                }
                Effect::Finish { reason } => return Ok(finished(&session, reason, sink)),
                Effect::GiveUp { attempts, url } => {
                    return Err(ScanError::AuthExhausted { attempts, url });
                }
            };
            let (next, effects) = update(session, msg);
            session = next;
            pending.extend(effects);
        }

        Err(stalled(&session))
    }

    /// Returns stored credentials, capturing fresh ones when none exist.
    /// `None` means the scan was cancelled during capture.
    async fn ensure_credentials(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Credentials>, ScanError> {
        match self.store.load() {
            Some(credentials) => Ok(Some(credentials)),
            None => {
                scan_info!("No stored credentials; capturing");
                self.recapture(cancel).await
            }
        }
    }

    /// Captures, stores and reloads a credential. The browser session is
    /// dropped as soon as `cancel` fires, which yields `None`.
    async fn recapture(&self, cancel: &CancellationToken) -> Result<Option<Credentials>, ScanError> {
        let captured = tokio::select! {
            _ = cancel.cancelled() => {
                scan_info!("Scan cancelled during credential capture");
                return Ok(None);
            }
            captured = self.capture.capture() => captured?,
        };
        self.store.save(&captured)?;
        self.store
            .load()
            .map(Some)
            .ok_or_else(|| PersistError::ReadBack(self.store.path().to_path_buf()).into())
    }

    async fn fetch_page(
        &self,
        url: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<Msg, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Msg::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                scan_info!("Scan cancelled while fetching {}", url);
                return Ok(Msg::Cancelled);
            }
            result = self.fetcher.fetch(url, credentials) => result,
        };

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return match err.kind {
                    FailureKind::HttpStatus(status) => Ok(Msg::FetchRejected { status }),
                    _ => Err(ScanError::Network {
                        url: url.to_string(),
                        source: err,
                    }),
                };
            }
        };
        scan_debug!("Fetched {} bytes from {}", output.metadata.byte_len, url);

        match decode_page(&output.bytes) {
            Ok(PageBody::Empty) => {
                scan_info!("No more results after {}", url);
                Ok(Msg::EndOfResults)
            }
            Ok(PageBody::Page(page)) => Ok(Msg::PageFetched(page)),
            Err(err) => Err(ScanError::Protocol {
                url: url.to_string(),
                snippet: String::from_utf8_lossy(&output.bytes)
                    .chars()
                    .take(SNIPPET_CHARS)
                    .collect(),
                message: err.to_string(),
            }),
        }
    }
}

fn finished(session: &ScanSession, reason: StopReason, sink: &dyn ProgressSink) -> ScanOutcome {
    scan_info!(
        "Scan finished ({:?}): scanned={} best={}",
        reason,
        session.scanned(),
        session.best_count()
    );
    sink.emit(ScanEvent::Finished { reason });
    ScanOutcome {
        best: session.best().cloned(),
        like_count: session.best_count(),
        scanned: session.scanned(),
        reason,
    }
}

/// Error for an effect queue that drained without `Finish` or `GiveUp`.
fn stalled(session: &ScanSession) -> ScanError {
    ScanError::Stalled {
        url: session.current_url().unwrap_or_default().to_string(),
    }
}
