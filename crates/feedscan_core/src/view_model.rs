use crate::Candidate;

/// Progress observation emitted once per processed page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Share of the scan budget consumed, capped at 100.
    pub percent: f64,
    pub scanned: usize,
    pub budget: usize,
    pub best: Option<Candidate>,
}
