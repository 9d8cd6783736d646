use feedscan_core::{Candidate, ScanProgress, StopReason};
use feedscan_engine::{ProgressSink, ScanEvent, ScanOutcome};
use serde::Serialize;

/// Prints scan progress to stdout, one line per page.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ScanEvent) {
        match event {
            ScanEvent::Progress(progress) => println!("{}", progress_line(&progress)),
            ScanEvent::Reauthenticating { attempt } => {
                println!("Failed to retrieve data. Retrying... (attempt {attempt})")
            }
            ScanEvent::Finished {
                reason: StopReason::EndOfResults,
            } => println!("No more results to scan."),
            ScanEvent::Finished {
                reason: StopReason::Cancelled,
            } => println!("Scan cancelled."),
            ScanEvent::Finished { .. } => {}
        }
    }
}

pub fn progress_line(progress: &ScanProgress) -> String {
    let mut line = format!("Scanning progress: {:.2} %", progress.percent);
    if let Some(best) = &progress.best {
        line.push_str(&format!(
            "  [ Most likes so far: {}, URL: {} ]",
            best.like_count, best.url
        ));
    }
    line
}

#[derive(Serialize)]
struct CandidateView<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    item_type: &'a str,
    category: &'a str,
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    url: &'a str,
    provider: &'a str,
}

impl<'a> From<&'a Candidate> for CandidateView<'a> {
    fn from(candidate: &'a Candidate) -> Self {
        Self {
            id: &candidate.id,
            item_type: &candidate.item_type,
            category: &candidate.category,
            title: &candidate.title,
            abstract_text: &candidate.abstract_text,
            url: &candidate.url,
            provider: &candidate.provider,
        }
    }
}

pub fn candidate_json(candidate: Option<&Candidate>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&candidate.map(CandidateView::from))
}

pub fn summary(only_type: &str, max_scans: u64, outcome: &ScanOutcome) -> serde_json::Result<String> {
    Ok(format!(
        "\n\nThe 'type={only_type}' result with most likes in top {max_scans} results is:\n{}\n\nTotal likes:\n {}",
        candidate_json(outcome.best.as_ref())?,
        outcome.like_count
    ))
}
